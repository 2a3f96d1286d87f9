use std::rc::Rc;

use luno_compiler::compile;
use luno_core::opcode::OpCode;
use luno_core::proto::{Constant, Prototype};

/// Compile `source` and return the prototype of its main chunk.
pub fn main_proto(source: &str) -> Rc<Prototype> {
    match compile(source.as_bytes(), "=test") {
        Ok(proto) => proto,
        Err(e) => panic!("compile of {source:?} failed: {e}"),
    }
}

/// Compile `source` and return the message of the error it reports.
pub fn compile_error(source: &str) -> String {
    match compile(source.as_bytes(), "=test") {
        Ok(_) => panic!("compile of {source:?} succeeded"),
        Err(e) => e.message,
    }
}

/// Whether `proto` contains at least one `op` instruction.
pub fn emits(proto: &Prototype, op: OpCode) -> bool {
    proto.code.iter().any(|ins| ins.opcode() == op)
}

/// How many `op` instructions `proto` contains.
pub fn opcode_count(proto: &Prototype, op: OpCode) -> usize {
    proto.code.iter().filter(|ins| ins.opcode() == op).count()
}

/// Index of the first `op` instruction in `proto`.
#[allow(dead_code)]
pub fn first_opcode(proto: &Prototype, op: OpCode) -> Option<usize> {
    proto.code.iter().position(|ins| ins.opcode() == op)
}

/// The constant at `idx`, which must be a string.
pub fn const_str(proto: &Prototype, idx: usize) -> String {
    let Constant::Str(s) = &proto.constants[idx] else {
        panic!("constant {idx} is {:?}", proto.constants[idx]);
    };
    String::from_utf8_lossy(s.as_bytes()).into_owned()
}

/// The constant at `idx`, which must be an integer.
pub fn const_int(proto: &Prototype, idx: usize) -> i64 {
    let Constant::Integer(n) = &proto.constants[idx] else {
        panic!("constant {idx} is {:?}", proto.constants[idx]);
    };
    *n
}

/// The constant at `idx`, which must be a float.
pub fn const_float(proto: &Prototype, idx: usize) -> f64 {
    let Constant::Float(x) = &proto.constants[idx] else {
        panic!("constant {idx} is {:?}", proto.constants[idx]);
    };
    *x
}
