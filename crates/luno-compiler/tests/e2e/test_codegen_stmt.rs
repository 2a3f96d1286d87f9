use super::helpers::*;
use luno_core::opcode::OpCode;

#[test]
fn local_declaration() {
    let proto = main_proto("local x = 5");
    assert!(emits(&proto, OpCode::LoadK));
    assert_eq!(proto.loc_vars[0].name.as_bytes(), b"x");
}

#[test]
fn local_declaration_without_value() {
    let proto = main_proto("local x");
    assert!(emits(&proto, OpCode::LoadNil));
}

#[test]
fn multiple_locals_adjust() {
    let proto = main_proto("local a, b, c = 1, 2");
    // Two values for three targets: the third gets nil
    assert!(emits(&proto, OpCode::LoadNil));
    assert_eq!(proto.loc_vars.len(), 3);
}

#[test]
fn local_assignment() {
    let proto = main_proto("local x x = 7");
    assert!(emits(&proto, OpCode::LoadK));
}

#[test]
fn swap_assignment_uses_temporaries() {
    let proto = main_proto("local a, b = 1, 2 a, b = b, a");
    assert!(opcode_count(&proto, OpCode::Move) >= 2);
}

#[test]
fn if_emits_test_and_jump() {
    let proto = main_proto("local a if a then a = 1 end");
    assert!(emits(&proto, OpCode::Test));
    assert!(emits(&proto, OpCode::Jmp));
}

#[test]
fn if_else_has_two_jumps() {
    let proto = main_proto("local a, b if a then b = 1 else b = 2 end");
    assert!(opcode_count(&proto, OpCode::Jmp) >= 2);
}

#[test]
fn while_loops_back() {
    let proto = main_proto("local a while a do a = false end");
    assert!(emits(&proto, OpCode::Test));
    assert!(opcode_count(&proto, OpCode::Jmp) >= 2);
}

#[test]
fn repeat_tests_at_bottom() {
    let proto = main_proto("local a repeat a = true until a");
    assert!(emits(&proto, OpCode::Test));
}

#[test]
fn numeric_for() {
    let proto = main_proto("for i = 1, 10 do end");
    assert!(emits(&proto, OpCode::ForPrep));
    assert!(emits(&proto, OpCode::ForLoop));
}

#[test]
fn numeric_for_hidden_control_vars() {
    let proto = main_proto("for i = 1, 3 do end");
    let names: Vec<&[u8]> = proto.loc_vars.iter().map(|v| v.name.as_bytes()).collect();
    assert!(names.contains(&b"(FOR_INDEX)".as_slice()));
    assert!(names.contains(&b"(FOR_LIMIT)".as_slice()));
    assert!(names.contains(&b"(FOR_STEP)".as_slice()));
    assert!(names.contains(&b"i".as_slice()));
}

#[test]
fn generic_for() {
    let proto = main_proto("for k in next, {} do end");
    assert!(emits(&proto, OpCode::TForCall));
    assert!(emits(&proto, OpCode::TForLoop));
}

#[test]
fn generic_for_hidden_control_vars() {
    let proto = main_proto("local t for k, v in pairs(t) do end");
    let names: Vec<&[u8]> = proto.loc_vars.iter().map(|v| v.name.as_bytes()).collect();
    assert!(names.contains(&b"(FOR_GEN)".as_slice()));
    assert!(names.contains(&b"(FOR_STATE)".as_slice()));
    assert!(names.contains(&b"(FOR_CTRL)".as_slice()));
}

#[test]
fn break_emits_jump() {
    let proto = main_proto("while true do break end");
    assert!(emits(&proto, OpCode::Jmp));
}

#[test]
fn goto_emits_jump() {
    let proto = main_proto("do goto done end ::done::");
    assert!(emits(&proto, OpCode::Jmp));
}

#[test]
fn upvalue_write_from_closure() {
    let proto = main_proto("local x local function f() x = 1 end f()");
    let inner = &proto.protos[0];
    assert!(emits(inner, OpCode::SetUpval));
}

#[test]
fn upvalue_read_from_closure() {
    let proto = main_proto("local x local function f() return x end f()");
    let inner = &proto.protos[0];
    assert!(emits(inner, OpCode::GetUpval));
}

#[test]
fn block_exit_closes_captured_locals() {
    let proto = main_proto(
        "local f
         do
            local v = 1
            f = function() return v end
         end
         return f",
    );
    // A JMP with a > 0 closes upvalues from slot a-1 upward
    assert!(proto
        .code
        .iter()
        .any(|i| i.opcode() == OpCode::Jmp && i.a() > 0));
}

#[test]
fn loop_iteration_closes_captured_locals() {
    let proto = main_proto(
        "local t = {}
         for i = 1, 3 do
            t[i] = function() return i end
         end",
    );
    assert!(proto
        .code
        .iter()
        .any(|i| i.opcode() == OpCode::Jmp && i.a() > 0));
}

#[test]
fn return_with_no_values() {
    let proto = main_proto("return");
    let ret = proto.code[proto.code.len() - 1];
    assert_eq!(ret.opcode(), OpCode::Return);
    assert_eq!(ret.b(), 1);
}
