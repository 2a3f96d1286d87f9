use super::helpers::*;
use luno_core::opcode::OpCode;

#[test]
fn function_definition_emits_closure() {
    let proto = main_proto("local function f() end return f");
    assert!(emits(&proto, OpCode::Closure));
    assert_eq!(proto.protos.len(), 1);
}

#[test]
fn function_parameters() {
    let proto = main_proto("local function f(a, b) return a end f(1, 2)");
    let inner = &proto.protos[0];
    assert_eq!(inner.num_params, 2);
    assert!(!inner.is_vararg);
    assert_eq!(inner.loc_vars[0].name.as_bytes(), b"a");
    assert_eq!(inner.loc_vars[1].name.as_bytes(), b"b");
}

#[test]
fn vararg_function() {
    let proto = main_proto("local function f(...) return ... end f()");
    let inner = &proto.protos[0];
    assert!(inner.is_vararg);
    assert!(emits(inner, OpCode::VarArg));
}

#[test]
fn main_chunk_is_vararg() {
    let proto = main_proto("");
    assert!(proto.is_vararg);
    assert_eq!(proto.num_params, 0);
    // Implicit final return
    assert!(emits(&proto, OpCode::Return));
}

#[test]
fn main_chunk_env_upvalue() {
    let proto = main_proto("return x");
    assert_eq!(proto.upvalues.len(), 1);
    assert_eq!(proto.upvalue_names[0].as_bytes(), b"_ENV");
}

#[test]
fn upvalue_descriptor_for_enclosing_local() {
    let proto = main_proto("local a local b local function f() return b end f()");
    let inner = &proto.protos[0];
    assert_eq!(inner.upvalues.len(), 1);
    assert!(inner.upvalues[0].in_stack);
    assert_eq!(inner.upvalues[0].index, 1);
    assert_eq!(inner.upvalue_names[0].as_bytes(), b"b");
}

#[test]
fn upvalue_threaded_through_middle_function() {
    let proto = main_proto(
        "local x
         local function outer()
            local function inner() return x end
            return inner
         end
         return outer",
    );
    let outer = &proto.protos[0];
    let inner = &outer.protos[0];
    assert!(outer.upvalues[0].in_stack);
    assert!(!inner.upvalues[0].in_stack);
    assert_eq!(inner.upvalue_names[0].as_bytes(), b"x");
}

#[test]
fn method_definition_adds_self() {
    let proto = main_proto("local t = {} function t:m() return self end");
    let inner = &proto.protos[0];
    assert_eq!(inner.num_params, 1);
    assert_eq!(inner.loc_vars[0].name.as_bytes(), b"self");
}

#[test]
fn method_call_uses_self_opcode() {
    let proto = main_proto("local t t:m(1)");
    assert!(emits(&proto, OpCode::Self_));
}

#[test]
fn returned_call_becomes_tail_call() {
    let proto = main_proto("local f return f()");
    assert!(emits(&proto, OpCode::TailCall));
    assert!(!emits(&proto, OpCode::Call));
}

#[test]
fn call_statement_keeps_no_results() {
    let proto = main_proto("local f f(1, 2)");
    let call = proto
        .code
        .iter()
        .find(|i| i.opcode() == OpCode::Call)
        .copied()
        .unwrap();
    assert_eq!(call.b(), 3);
    assert_eq!(call.c(), 1);
}

#[test]
fn nested_function_prototypes() {
    let proto = main_proto(
        "local function a()
            local function b()
               local function c() end
               return c
            end
            return b
         end
         return a",
    );
    assert_eq!(proto.protos.len(), 1);
    assert_eq!(proto.protos[0].protos.len(), 1);
    assert_eq!(proto.protos[0].protos[0].protos.len(), 1);
}

#[test]
fn function_line_range() {
    let proto = main_proto("local function f()\nreturn 1\nend");
    let inner = &proto.protos[0];
    assert_eq!(inner.line_defined, 1);
    assert_eq!(inner.last_line_defined, 3);
    // The main chunk itself has no definition lines
    assert_eq!(proto.line_defined, 0);
}
