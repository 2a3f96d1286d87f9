use super::helpers::*;

// ---- error() ----

#[test]
fn test_error_prefixes_position() {
    let err = eval_err("error(\"boom\")");
    assert_eq!(err, "test:1: boom");
}

#[test]
fn test_error_level_zero_is_raw() {
    let err = eval_err("error(\"plain\", 0)");
    assert_eq!(err, "plain");
}

#[test]
fn test_error_reports_raising_line() {
    let err = eval_err("local x = 1\nlocal y = 2\nerror(\"third\")");
    assert_eq!(err, "test:3: third");
}

#[test]
fn test_error_with_table_value() {
    let results = eval(
        "local ok, e = pcall(function() error({ code = 451 }) end)
         return ok, e.code",
    );
    assert_bool(&results, 0, false);
    assert_int(&results, 1, 451);
}

#[test]
fn test_error_with_no_argument() {
    let results = eval("local ok, e = pcall(function() error() end) return ok, e");
    assert_bool(&results, 0, false);
    assert_nil(&results, 1);
}

// ---- pcall ----

#[test]
fn test_pcall_success_spreads_results() {
    let results = eval("return pcall(function() return 1, 2 end)");
    assert_bool(&results, 0, true);
    assert_int(&results, 1, 1);
    assert_int(&results, 2, 2);
}

#[test]
fn test_pcall_passes_arguments() {
    let results = eval("return pcall(function(a, b) return a + b end, 30, 12)");
    assert_bool(&results, 0, true);
    assert_int(&results, 1, 42);
}

#[test]
fn test_pcall_traps_runtime_error() {
    let results = eval("local ok, err = pcall(function() return nil + 1 end) return ok, err");
    assert_bool(&results, 0, false);
    let err = results[1].as_str().map(|s| s.to_string()).unwrap_or_default();
    assert!(
        err.contains("attempt to perform arithmetic on a nil value"),
        "got: {err}"
    );
}

#[test]
fn test_pcall_on_noncallable() {
    let results = eval("local ok, err = pcall(42) return ok, err");
    assert_bool(&results, 0, false);
    let err = results[1].as_str().map(|s| s.to_string()).unwrap_or_default();
    assert!(err.contains("attempt to call a number value"), "got: {err}");
}

#[test]
fn test_nested_pcall_inner_catches() {
    let results = eval(
        "local ok1, ok2, err = pcall(function()
            local ok, e = pcall(error, 'inner')
            return ok, e
         end)
         return ok1, ok2, err",
    );
    assert_bool(&results, 0, true);
    assert_bool(&results, 1, false);
}

#[test]
fn test_execution_resumes_after_pcall() {
    check_ints(
        "local n = 0
         pcall(function() n = 1 error('x') n = 99 end)
         n = n + 10
         return n",
        &[11],
    );
}

// ---- Runtime error messages ----

#[test]
fn test_index_nil_error() {
    let err = eval_err("local t return t.field");
    assert!(err.contains("attempt to index a nil value"), "got: {err}");
    assert!(err.starts_with("test:1:"), "got: {err}");
}

#[test]
fn test_call_nil_error() {
    let err = eval_err("local f f()");
    assert!(err.contains("attempt to call a nil value"), "got: {err}");
}

#[test]
fn test_concat_error_names_offender() {
    let err = eval_err("return {} .. 'x'");
    assert!(err.contains("attempt to concatenate a table value"), "got: {err}");
}

#[test]
fn test_compare_error_messages() {
    let err = eval_err("return {} < {}");
    assert!(err.contains("attempt to compare two table values"), "got: {err}");
    let err = eval_err("return 1 < 'x'");
    assert!(err.contains("attempt to compare number with string"), "got: {err}");
}

#[test]
fn test_arith_error_names_nonnumber_operand() {
    let err = eval_err("return 1 + {}");
    assert!(err.contains("attempt to perform arithmetic on a table value"), "got: {err}");
}

#[test]
fn test_for_loop_coercion_errors() {
    let err = eval_err("for i = {}, 10 do end");
    assert!(err.contains("'for' initial value must be a number"), "got: {err}");
    let err = eval_err("for i = 1, {} do end");
    assert!(err.contains("'for' limit must be a number"), "got: {err}");
    let err = eval_err("for i = 1, 10, {} do end");
    assert!(err.contains("'for' step must be a number"), "got: {err}");
}

#[test]
fn test_error_in_metamethod_carries_its_position() {
    let results = eval(
        "local t = setmetatable({}, {
            __index = function() error('from handler') end,
         })
         local ok, err = pcall(function() return t.k end)
         return ok, err",
    );
    assert_bool(&results, 0, false);
    let err = results[1].as_str().map(|s| s.to_string()).unwrap_or_default();
    assert!(err.contains("from handler"), "got: {err}");
    assert!(err.contains("test:2:"), "got: {err}");
}
