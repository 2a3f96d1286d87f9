use super::helpers::*;

use luno_compiler::compile;
use luno_core::chunk;
use luno_core::value::Value;
use luno_vm::error::LuaError;
use luno_vm::execute_source;
use luno_vm::vm::Vm;

// ---- One-shot execution ----

#[test]
fn test_execute_source() {
    let results = execute_source("return 2 + 3").unwrap();
    assert_int(&results, 0, 5);
}

#[test]
fn test_execute_source_reports_runtime_error() {
    let err = execute_source("error('boom')").unwrap_err();
    assert_eq!(format!("{err}"), "input:1: boom");
}

// ---- load_chunk on source text ----

#[test]
fn test_load_chunk_compiles_source() {
    let mut vm = Vm::new();
    let main = vm.load_chunk(b"return 'src'", "=inline").unwrap();
    let results = vm.call(main, Vec::new()).unwrap();
    assert_str(&results, 0, "src");
}

#[test]
fn test_load_chunk_rejects_bad_source() {
    let mut vm = Vm::new();
    let err = vm.load_chunk(b"return +", "=bad").unwrap_err();
    assert!(matches!(err, LuaError::Compile(_)), "got: {err}");
}

#[test]
fn test_loaded_chunks_share_globals() {
    let mut vm = Vm::new();
    let set = vm.load_chunk(b"shared = 7", "=first").unwrap();
    vm.call(set, Vec::new()).unwrap();
    let get = vm.load_chunk(b"return shared", "=second").unwrap();
    let results = vm.call(get, Vec::new()).unwrap();
    assert_int(&results, 0, 7);
}

// ---- Binary chunks ----

#[test]
fn test_dump_roundtrip_executes() {
    let proto = compile(
        b"local n = 40\nlocal function f() return n + 2 end\nreturn f()",
        "@chunk.lua",
    )
    .unwrap();
    let bytes = chunk::dump(&proto);
    assert!(chunk::is_binary_chunk(&bytes));

    let mut vm = Vm::new();
    let main = vm.load_chunk(&bytes, "@chunk.lua").unwrap();
    let results = vm.call(main, Vec::new()).unwrap();
    assert_int(&results, 0, 42);
}

#[test]
fn test_dump_roundtrip_preserves_constants() {
    let proto = compile(b"return 1, 2.5, 'str', true", "@k.lua").unwrap();
    let bytes = chunk::dump(&proto);

    let mut vm = Vm::new();
    let main = vm.load_chunk(&bytes, "@k.lua").unwrap();
    let results = vm.call(main, Vec::new()).unwrap();
    assert_int(&results, 0, 1);
    assert_float(&results, 1, 2.5);
    assert_str(&results, 2, "str");
    assert_bool(&results, 3, true);
}

#[test]
fn test_dump_roundtrip_preserves_error_positions() {
    let proto = compile(b"error('x')", "@boom.lua").unwrap();
    let bytes = chunk::dump(&proto);

    let mut vm = Vm::new();
    let main = vm.load_chunk(&bytes, "@boom.lua").unwrap();
    let err = vm.call(main, Vec::new()).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.starts_with("boom.lua:1:"), "got: {msg}");
}

#[test]
fn test_load_chunk_rejects_truncated_dump() {
    let proto = compile(b"return 1", "@t.lua").unwrap();
    let mut bytes = chunk::dump(&proto);
    bytes.truncate(bytes.len() / 2);

    let mut vm = Vm::new();
    let err = vm.load_chunk(&bytes, "@t.lua").unwrap_err();
    assert!(matches!(err, LuaError::Format(_)), "got: {err}");
}

// ---- Calling the main chunk directly ----

#[test]
fn test_main_chunk_receives_varargs() {
    let proto = compile(b"return ...", "=args").unwrap();
    let mut vm = Vm::new();
    let main = vm.load(proto);
    let results = vm
        .call(main, vec![Value::Integer(9), Value::Integer(10)])
        .unwrap();
    assert_int(&results, 0, 9);
    assert_int(&results, 1, 10);
}
