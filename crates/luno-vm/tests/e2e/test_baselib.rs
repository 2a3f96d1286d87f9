use super::helpers::*;

// ---- type ----

#[test]
fn test_type_names() {
    let results = eval(
        "return type(nil), type(true), type(1), type(1.5), type('s'), type({}), type(print)",
    );
    assert_str(&results, 0, "nil");
    assert_str(&results, 1, "boolean");
    assert_str(&results, 2, "number");
    assert_str(&results, 3, "number");
    assert_str(&results, 4, "string");
    assert_str(&results, 5, "table");
    assert_str(&results, 6, "function");
}

// ---- tostring ----

#[test]
fn test_tostring_renderings() {
    let results = eval(
        "return tostring(42), tostring(1.5), tostring(3.0), tostring(nil), tostring(true), tostring('already')",
    );
    assert_str(&results, 0, "42");
    assert_str(&results, 1, "1.5");
    assert_str(&results, 2, "3.0");
    assert_str(&results, 3, "nil");
    assert_str(&results, 4, "true");
    assert_str(&results, 5, "already");
}

#[test]
fn test_tostring_table_prefix() {
    let results = eval("return tostring({})");
    let s = results[0].as_str().map(|s| s.to_string()).unwrap_or_default();
    assert!(s.starts_with("table: "), "got: {s}");
}

// ---- tonumber ----

#[test]
fn test_tonumber_plain() {
    let results = eval(
        "return tonumber(42), tonumber('42'), tonumber('0x1F'), tonumber('  10  '), tonumber('1.5'), tonumber('z')",
    );
    assert_int(&results, 0, 42);
    assert_int(&results, 1, 42);
    assert_int(&results, 2, 31);
    assert_int(&results, 3, 10);
    assert_float(&results, 4, 1.5);
    assert_nil(&results, 5);
}

#[test]
fn test_tonumber_with_base() {
    let results = eval(
        "return tonumber('ff', 16), tonumber('10', 2), tonumber('777', 8), tonumber('Z', 36), tonumber('2', 2)",
    );
    assert_int(&results, 0, 255);
    assert_int(&results, 1, 2);
    assert_int(&results, 2, 511);
    assert_int(&results, 3, 35);
    assert_nil(&results, 4);
}

#[test]
fn test_tonumber_base_out_of_range() {
    let results = eval("return pcall(tonumber, '1', 1)");
    assert_bool(&results, 0, false);
}

// ---- select ----

#[test]
fn test_select_count_and_slice() {
    let results = eval("return select('#', 'a', 'b', 'c'), select(2, 'a', 'b', 'c')");
    assert_int(&results, 0, 3);
    assert_str(&results, 1, "b");
    assert_str(&results, 2, "c");
}

#[test]
fn test_select_negative_counts_from_end() {
    let results = eval("return select(-1, 'a', 'b', 'c')");
    assert_str(&results, 0, "c");
}

#[test]
fn test_select_past_end_returns_nothing() {
    check_ints(
        "local function count(...) return select('#', ...) end
         return count(select(5, 'a', 'b'))",
        &[0],
    );
}

// ---- raw access ----

#[test]
fn test_rawget_bypasses_index() {
    let results = eval(
        "local t = setmetatable({}, { __index = function() return 9 end })
         return t.k, rawget(t, 'k')",
    );
    assert_int(&results, 0, 9);
    assert_nil(&results, 1);
}

#[test]
fn test_rawequal_ignores_eq() {
    let results = eval(
        "local mt = { __eq = function() return true end }
         local a = setmetatable({}, mt)
         local b = setmetatable({}, mt)
         return a == b, rawequal(a, b), rawequal(a, a), rawequal(1, 1.0)",
    );
    assert_bool(&results, 0, true);
    assert_bool(&results, 1, false);
    assert_bool(&results, 2, true);
    assert_bool(&results, 3, true);
}

#[test]
fn test_rawlen_ignores_len() {
    check_ints(
        "local t = setmetatable({1, 2, 3}, { __len = function() return 99 end })
         return #t, rawlen(t), rawlen('four')",
        &[99, 3, 4],
    );
}

// ---- assert ----

#[test]
fn test_assert_returns_all_arguments() {
    let results = eval("return assert(1, 'x')");
    assert_int(&results, 0, 1);
    assert_str(&results, 1, "x");
}

#[test]
fn test_assert_default_message() {
    let err = eval_err("assert(false)");
    assert!(err.contains("assertion failed!"), "got: {err}");
}

#[test]
fn test_assert_custom_message() {
    let err = eval_err("assert(nil, 'custom blame')");
    assert!(err.contains("custom blame"), "got: {err}");
}

#[test]
fn test_assert_nonstring_message_passes_through() {
    let results = eval("local ok, e = pcall(assert, nil, 42) return ok, e");
    assert_bool(&results, 0, false);
    assert_int(&results, 1, 42);
}

// ---- Metatable access ----

#[test]
fn test_getmetatable_roundtrip() {
    let results = eval(
        "local mt = {}
         local t = setmetatable({}, mt)
         return getmetatable(t) == mt, getmetatable({}), getmetatable(1)",
    );
    assert_bool(&results, 0, true);
    assert_nil(&results, 1);
    assert_nil(&results, 2);
}

#[test]
fn test_setmetatable_passes_table_through() {
    check_ints(
        "local t = setmetatable({ n = 3 }, {})
         return t.n",
        &[3],
    );
}

#[test]
fn test_setmetatable_clears_with_nil() {
    let results = eval(
        "local t = setmetatable({}, { __index = function() return 1 end })
         setmetatable(t, nil)
         return t.k, getmetatable(t)",
    );
    assert_nil(&results, 0);
    assert_nil(&results, 1);
}

#[test]
fn test_protected_metatable() {
    let results = eval(
        "local t = setmetatable({}, { __metatable = 'locked' })
         local ok, err = pcall(setmetatable, t, {})
         return getmetatable(t), ok, err",
    );
    assert_str(&results, 0, "locked");
    assert_bool(&results, 1, false);
    let err = results[2].as_str().map(|s| s.to_string()).unwrap_or_default();
    assert!(err.contains("cannot change a protected metatable"), "got: {err}");
}

// ---- Globals ----

#[test]
fn test_g_table_views_globals() {
    check_ints(
        "_G.foo = 7
         bar = 9
         return foo, _G.bar",
        &[7, 9],
    );
}

#[test]
fn test_g_contains_itself() {
    let results = eval("return _G._G == _G");
    assert_bool(&results, 0, true);
}

#[test]
fn test_version_string() {
    let results = eval("return _VERSION");
    assert_str(&results, 0, "Lua 5.3");
}

#[test]
fn test_print_runs() {
    check_ints("print('stdlib smoke', 1, nil, true) return 0", &[0]);
}
