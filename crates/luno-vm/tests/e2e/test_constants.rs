use super::helpers::*;

// ---- Simple values ----

#[test]
fn test_nil_true_false() {
    let results = eval("return nil, true, false");
    assert_nil(&results, 0);
    assert_bool(&results, 1, true);
    assert_bool(&results, 2, false);
}

#[test]
fn test_integer_literals() {
    check_ints("return 0, 42, 1000000", &[0, 42, 1000000]);
}

#[test]
fn test_hex_integer_literals() {
    check_ints("return 0xff, 0XFF, 0x10", &[255, 255, 16]);
}

#[test]
fn test_max_integer_literal() {
    check_ints(
        "return 0x7fffffffffffffff",
        &[i64::MAX],
    );
}

#[test]
fn test_float_literals() {
    let results = eval("return 1.5, 0.25, 1e2, 3.5e-1");
    assert_float(&results, 0, 1.5);
    assert_float(&results, 1, 0.25);
    assert_float(&results, 2, 100.0);
    assert_float(&results, 3, 0.35);
}

#[test]
fn test_hex_float_literal() {
    let results = eval("return 0x1p4, 0x.8p1");
    assert_float(&results, 0, 16.0);
    assert_float(&results, 1, 1.0);
}

#[test]
fn test_trailing_dot_is_float() {
    let results = eval("return 3., .5");
    assert_float(&results, 0, 3.0);
    assert_float(&results, 1, 0.5);
}

// ---- Strings ----

#[test]
fn test_string_literals() {
    let results = eval("return 'single', \"double\", ''");
    assert_str(&results, 0, "single");
    assert_str(&results, 1, "double");
    assert_str(&results, 2, "");
}

#[test]
fn test_string_escapes() {
    let results = eval(r#"return "a\tb", "x\ny", "q\\q", "he said \"hi\"""#);
    assert_str(&results, 0, "a\tb");
    assert_str(&results, 1, "x\ny");
    assert_str(&results, 2, "q\\q");
    assert_str(&results, 3, "he said \"hi\"");
}

#[test]
fn test_numeric_escapes() {
    let results = eval(r#"return "\65\66\67", "\x41\x42", "\u{48}\u{49}""#);
    assert_str(&results, 0, "ABC");
    assert_str(&results, 1, "AB");
    assert_str(&results, 2, "HI");
}

#[test]
fn test_z_escape_skips_whitespace() {
    let results = eval("return \"a\\z\n   b\"");
    assert_str(&results, 0, "ab");
}

#[test]
fn test_long_strings() {
    let results = eval("return [[hello]], [==[a]] b]==]");
    assert_str(&results, 0, "hello");
    assert_str(&results, 1, "a]] b");
}

#[test]
fn test_long_string_skips_first_newline() {
    let results = eval("return [[\nline]]");
    assert_str(&results, 0, "line");
}

// ---- Comments do not affect results ----

#[test]
fn test_comments_ignored() {
    check_ints(
        "-- line comment
         local x = 1 -- trailing
         --[[ long
              comment ]]
         return x + 1",
        &[2],
    );
}
