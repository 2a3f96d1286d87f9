use super::helpers::*;

use luno_compiler::compile;

#[test]
fn error_unfinished_string() {
    let err = compile_error("local x = \"hello");
    assert!(err.contains("unfinished string"), "got: {err}");
}

#[test]
fn error_unfinished_long_string() {
    let err = compile_error("local x = [[hello");
    assert!(err.contains("unfinished long"), "got: {err}");
}

#[test]
fn error_malformed_number() {
    let err = compile_error("local x = 3abc");
    assert!(err.contains("malformed number"), "got: {err}");
}

#[test]
fn error_hex_without_digits() {
    let err = compile_error("return 0x");
    assert!(err.contains("malformed number"), "got: {err}");
}

#[test]
fn error_invalid_escape() {
    let err = compile_error("local x = \"\\q\"");
    assert!(err.contains("invalid escape"), "got: {err}");
}

#[test]
fn error_break_outside_loop() {
    let err = compile_error("break");
    assert!(err.contains("break outside loop"), "got: {err}");
}

#[test]
fn error_duplicate_label() {
    let err = compile_error("::x:: ::x::");
    assert!(err.contains("label 'x' already defined"), "got: {err}");
}

#[test]
fn error_goto_without_label() {
    let err = compile_error("goto nowhere");
    assert!(err.contains("no visible label 'nowhere'"), "got: {err}");
}

#[test]
fn error_goto_into_local_scope() {
    let err = compile_error("goto l local x ::l:: x = 1");
    assert!(err.contains("jumps into the scope of local 'x'"), "got: {err}");
}

#[test]
fn error_unexpected_symbol() {
    let err = compile_error("return )");
    assert!(err.contains("unexpected symbol"), "got: {err}");
}

#[test]
fn error_missing_end() {
    let err = compile_error("if true then");
    assert!(err.contains("'end' expected"), "got: {err}");
}

#[test]
fn error_missing_then() {
    let err = compile_error("if true do end");
    assert!(err.contains("'then' expected"), "got: {err}");
}

#[test]
fn error_statement_after_return() {
    let err = compile_error("return 1 local x = 2");
    assert!(err.contains("expected"), "got: {err}");
}

#[test]
fn error_expression_as_statement() {
    let err = compile_error("42");
    assert!(err.contains("syntax error"), "got: {err}");
}

#[test]
fn error_vararg_outside_vararg_function() {
    let err = compile_error("function f() return ... end");
    assert!(err.contains("outside a vararg function"), "got: {err}");
}

#[test]
fn error_assignment_to_call() {
    let err = compile_error("local f f() = 1");
    assert!(err.contains("syntax error"), "got: {err}");
}

#[test]
fn error_register_overflow() {
    // More locals than one frame can address
    let mut src = String::new();
    for i in 0..300 {
        src.push_str(&format!("local a{i} = {i}\n"));
    }
    let err = compile_error(&src);
    assert!(err.contains("too many registers"), "got: {err}");
}

#[test]
fn error_carries_line_number() {
    let err = compile(b"local a = 1\nlocal b = \"x", "=test").unwrap_err();
    assert_eq!(err.line, 2);
}
