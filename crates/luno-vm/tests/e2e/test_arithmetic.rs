use super::helpers::*;

// ---- Integer arithmetic ----

#[test]
fn test_integer_ops() {
    check_ints(
        "return 1 + 2, 10 - 4, 6 * 7, 7 // 2, 7 % 3",
        &[3, 6, 42, 3, 1],
    );
}

#[test]
fn test_floor_division_rounds_down() {
    check_ints("return -7 // 2, 7 // -2, -7 // -2", &[-4, -4, 3]);
}

#[test]
fn test_modulo_takes_divisor_sign() {
    check_ints("return -7 % 3, 7 % -3, -7 % -3", &[2, -2, -1]);
}

#[test]
fn test_integer_overflow_wraps() {
    check_ints("return 0x7fffffffffffffff + 1", &[i64::MIN]);
    check_ints("return 0x7fffffffffffffff * 2", &[-2]);
}

#[test]
fn test_unary_minus() {
    check_ints("return -5, -(-5)", &[-5, 5]);
    let results = eval("return -1.5");
    assert_float(&results, 0, -1.5);
}

// ---- Float arithmetic ----

#[test]
fn test_division_is_float() {
    let results = eval("return 7 / 2, 4 / 2");
    assert_float(&results, 0, 3.5);
    assert_float(&results, 1, 2.0);
}

#[test]
fn test_pow_is_float() {
    let results = eval("return 2 ^ 10, 2 ^ -1");
    assert_float(&results, 0, 1024.0);
    assert_float(&results, 1, 0.5);
}

#[test]
fn test_mixed_promotes_to_float() {
    let results = eval("return 1 + 0.5, 2 * 1.5, 10.0 // 3");
    assert_float(&results, 0, 1.5);
    assert_float(&results, 1, 3.0);
    assert_float(&results, 2, 3.0);
}

#[test]
fn test_float_mod() {
    let results = eval("return 5.5 % 2, -5.5 % 2");
    assert_float(&results, 0, 1.5);
    assert_float(&results, 1, 0.5);
}

#[test]
fn test_float_division_by_zero() {
    let results = eval("return 1 / 0 > 1e308, -1 / 0 < -1e308, (0 / 0) ~= (0 / 0)");
    assert_bool(&results, 0, true);
    assert_bool(&results, 1, true);
    assert_bool(&results, 2, true);
}

// ---- Integer division by zero errors ----

#[test]
fn test_integer_floor_div_by_zero() {
    let err = eval_err("return 10 // 0");
    assert!(err.contains("attempt to perform 'n//0'"), "got: {err}");
}

#[test]
fn test_integer_mod_by_zero() {
    let err = eval_err("return 10 % 0");
    assert!(err.contains("attempt to perform 'n%0'"), "got: {err}");
}

// ---- String coercion ----

#[test]
fn test_string_arith_coercion() {
    check_ints("return \"10\" + 5, \"3\" * \"4\", -\"7\"", &[15, 12, -7]);
}

#[test]
fn test_string_coercion_keeps_subtype() {
    let results = eval("return \"1.5\" + 0, \"0x10\" + 0");
    assert_float(&results, 0, 1.5);
    assert_int(&results, 1, 16);
}

#[test]
fn test_non_numeric_string_errors() {
    let err = eval_err("return \"pig\" + 1");
    assert!(
        err.contains("attempt to perform arithmetic on a string value"),
        "got: {err}"
    );
}

// ---- Bitwise operators ----

#[test]
fn test_bitwise_ops() {
    check_ints(
        "return 0xF0 & 0x3C, 0xF0 | 0x0C, 0xF0 ~ 0xFF, ~0",
        &[0x30, 0xFC, 0x0F, -1],
    );
}

#[test]
fn test_shifts() {
    check_ints("return 1 << 4, 0x100 >> 4, 1 << 0", &[16, 16, 1]);
}

#[test]
fn test_shift_by_width_or_more_is_zero() {
    check_ints("return 1 << 64, 1 << 100, -1 >> 64", &[0, 0, 0]);
}

#[test]
fn test_negative_shift_reverses() {
    check_ints("return 1 << -2, 16 >> -2", &[0, 64]);
}

#[test]
fn test_shift_is_logical() {
    check_ints("return -1 >> 1", &[i64::MAX]);
}

#[test]
fn test_bitwise_accepts_integral_floats() {
    check_ints("return 3.0 & 1, 6.0 | 1", &[1, 7]);
}

#[test]
fn test_bitwise_rejects_fractional() {
    let err = eval_err("return 1.5 & 1");
    assert!(err.contains("number has no integer representation"), "got: {err}");
}

#[test]
fn test_bitwise_rejects_non_number() {
    let err = eval_err("return {} & 1");
    assert!(
        err.contains("attempt to perform bitwise operation on a table value"),
        "got: {err}"
    );
}

// ---- Comparison ----

#[test]
fn test_numeric_comparison() {
    let results = eval("return 1 < 2, 2 < 1, 2 <= 2, 3 > 2, 3 >= 4, 1 < 1.5, 2.5 > 2");
    assert_bool(&results, 0, true);
    assert_bool(&results, 1, false);
    assert_bool(&results, 2, true);
    assert_bool(&results, 3, true);
    assert_bool(&results, 4, false);
    assert_bool(&results, 5, true);
    assert_bool(&results, 6, true);
}

#[test]
fn test_string_comparison_is_bytewise() {
    let results = eval("return \"a\" < \"b\", \"abc\" < \"abd\", \"ab\" < \"b\", \"\" < \"a\"");
    for i in 0..4 {
        assert_bool(&results, i, true);
    }
}

#[test]
fn test_equality() {
    let results = eval(
        "return 1 == 1.0, \"1\" == 1, nil == false, \"a\" == \"a\", 1 ~= 2",
    );
    assert_bool(&results, 0, true);
    assert_bool(&results, 1, false);
    assert_bool(&results, 2, false);
    assert_bool(&results, 3, true);
    assert_bool(&results, 4, true);
}

#[test]
fn test_table_equality_is_identity() {
    let results = eval(
        "local a = {}
         local b = {}
         local c = a
         return a == b, a == c",
    );
    assert_bool(&results, 0, false);
    assert_bool(&results, 1, true);
}

#[test]
fn test_cross_type_comparison_errors() {
    let err = eval_err("return 1 < \"x\"");
    assert!(err.contains("attempt to compare number with string"), "got: {err}");
    let err = eval_err("return {} < {}");
    assert!(err.contains("attempt to compare two table values"), "got: {err}");
}

// ---- Concatenation ----

#[test]
fn test_concat() {
    let results = eval("return \"a\" .. \"b\" .. \"c\", 1 .. 2, \"v=\" .. 1.5");
    assert_str(&results, 0, "abc");
    assert_str(&results, 1, "12");
    assert_str(&results, 2, "v=1.5");
}

#[test]
fn test_concat_float_rendering() {
    let results = eval("return 3.0 .. \"\"");
    assert_str(&results, 0, "3.0");
}

#[test]
fn test_concat_non_string_errors() {
    let err = eval_err("return {} .. \"x\"");
    assert!(err.contains("attempt to concatenate a table value"), "got: {err}");
    let err = eval_err("return \"x\" .. nil");
    assert!(err.contains("attempt to concatenate a nil value"), "got: {err}");
}

// ---- Length and not ----

#[test]
fn test_length_operator() {
    check_ints("return #\"hello\", #\"\", #{1, 2, 3}", &[5, 0, 3]);
}

#[test]
fn test_length_of_number_errors() {
    let err = eval_err("return #42");
    assert!(err.contains("attempt to get length of a number value"), "got: {err}");
}

#[test]
fn test_not() {
    let results = eval("return not nil, not false, not 0, not \"\"");
    assert_bool(&results, 0, true);
    assert_bool(&results, 1, true);
    assert_bool(&results, 2, false);
    assert_bool(&results, 3, false);
}
