use super::helpers::*;
use luno_core::opcode::OpCode;

#[test]
fn return_nil() {
    let proto = main_proto("return nil");
    assert!(emits(&proto, OpCode::LoadNil));
    assert!(emits(&proto, OpCode::Return));
}

#[test]
fn return_true() {
    let proto = main_proto("return true");
    assert!(emits(&proto, OpCode::LoadBool));
}

#[test]
fn return_integer() {
    let proto = main_proto("return 42");
    assert!(emits(&proto, OpCode::LoadK));
    assert_eq!(const_int(&proto, 0), 42);
}

#[test]
fn return_negative_integer() {
    // Folded at parse time: no UNM survives
    let proto = main_proto("return -1");
    assert!(emits(&proto, OpCode::LoadK));
    assert!(!emits(&proto, OpCode::Unm));
    assert_eq!(const_int(&proto, 0), -1);
}

#[test]
fn return_float() {
    let proto = main_proto("return 3.25");
    assert!(emits(&proto, OpCode::LoadK));
    assert_eq!(const_float(&proto, 0), 3.25);
}

#[test]
fn return_string() {
    let proto = main_proto("return \"hello world\"");
    assert!(emits(&proto, OpCode::LoadK));
    assert_eq!(const_str(&proto, 0), "hello world");
}

#[test]
fn folding_not() {
    let proto = main_proto("return not nil");
    assert!(emits(&proto, OpCode::LoadBool));
    assert!(!emits(&proto, OpCode::Not));
}

#[test]
fn folding_bnot() {
    let proto = main_proto("return ~0");
    assert!(!emits(&proto, OpCode::BNot));
    assert_eq!(const_int(&proto, 0), -1);
}

#[test]
fn folding_integer_arith() {
    let proto = main_proto("return 2 + 3 * 4");
    assert!(!emits(&proto, OpCode::Add));
    assert!(!emits(&proto, OpCode::Mul));
    assert_eq!(const_int(&proto, 0), 14);
}

#[test]
fn folding_division_makes_float() {
    let proto = main_proto("return 7 / 2");
    assert!(!emits(&proto, OpCode::Div));
    assert_eq!(const_float(&proto, 0), 3.5);
}

#[test]
fn division_by_zero_not_folded_for_integers() {
    // 1 // 0 raises at runtime, so it must survive to the bytecode
    let proto = main_proto("return 1 // 0");
    assert!(emits(&proto, OpCode::IDiv));
}

#[test]
fn arithmetic_on_locals() {
    let proto = main_proto("local a = 1\nlocal b = 2\nreturn a + b");
    assert!(emits(&proto, OpCode::Add));
}

#[test]
fn string_arith_not_folded() {
    let proto = main_proto("return '10' + 5");
    assert!(emits(&proto, OpCode::Add));
}

#[test]
fn comparison_ops() {
    let proto = main_proto("local a = 1\nlocal b = 2\nif a < b then end");
    assert!(emits(&proto, OpCode::Lt));
}

#[test]
fn and_on_locals_short_circuits() {
    let proto = main_proto("local a, b return a and b");
    assert!(emits(&proto, OpCode::TestSet));
    assert!(emits(&proto, OpCode::Jmp));
}

#[test]
fn and_with_constant_lhs_folds_away() {
    let proto = main_proto("return true and 42");
    assert!(!emits(&proto, OpCode::TestSet));
    assert_eq!(const_int(&proto, 0), 42);
}

#[test]
fn or_with_falsy_lhs_folds_away() {
    let proto = main_proto("return nil or 42");
    assert!(!emits(&proto, OpCode::TestSet));
    assert_eq!(const_int(&proto, 0), 42);
}

#[test]
fn concat() {
    let proto = main_proto("local a, b return a .. b");
    assert!(emits(&proto, OpCode::Concat));
}

#[test]
fn length_operator() {
    let proto = main_proto("local s = 'abc' return #s");
    assert!(emits(&proto, OpCode::Len));
}

#[test]
fn unm_on_local() {
    let proto = main_proto("local a return -a");
    assert!(emits(&proto, OpCode::Unm));
}

#[test]
fn table_constructor_empty() {
    let proto = main_proto("return {}");
    assert!(emits(&proto, OpCode::NewTable));
}

#[test]
fn table_constructor_array() {
    let proto = main_proto("return {1, 2, 3}");
    assert!(emits(&proto, OpCode::NewTable));
    assert!(emits(&proto, OpCode::SetList));
}

#[test]
fn table_constructor_hash() {
    let proto = main_proto("return {x = 1, y = 2}");
    assert!(emits(&proto, OpCode::NewTable));
    assert_eq!(opcode_count(&proto, OpCode::SetTable), 2);
}

#[test]
fn index_read() {
    let proto = main_proto("local t = {} return t.k");
    assert!(emits(&proto, OpCode::GetTable));
}

#[test]
fn index_write() {
    let proto = main_proto("local t = {} t.k = 1");
    assert!(emits(&proto, OpCode::SetTable));
}

#[test]
fn global_read_through_env() {
    let proto = main_proto("return x");
    assert!(emits(&proto, OpCode::GetTabUp));
}

#[test]
fn global_write_through_env() {
    let proto = main_proto("x = 1");
    assert!(emits(&proto, OpCode::SetTabUp));
}

#[test]
fn vararg_expression() {
    let proto = main_proto("return ...");
    assert!(emits(&proto, OpCode::VarArg));
}
