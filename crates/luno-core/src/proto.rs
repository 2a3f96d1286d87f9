//! Compiled function prototypes: bytecode, constant pool, upvalue
//! descriptors, nested prototypes, and debug tables.
//!
//! A prototype is immutable once emitted. The VM shares it via `Rc`; every
//! closure instantiated from the same function body points at one copy.

use crate::opcode::Instruction;
use crate::value::{LuaStr, Value};
use std::rc::Rc;

/// A constant-pool entry.
#[derive(Clone, Debug)]
pub enum Constant {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(LuaStr),
}

impl Constant {
    /// Pool-level identity: floats compare by bits, so 0.0 and -0.0 get
    /// separate slots and NaN can be pooled at all.
    pub fn same(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Nil, Constant::Nil) => true,
            (Constant::Boolean(a), Constant::Boolean(b)) => a == b,
            (Constant::Integer(a), Constant::Integer(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Str(a), Constant::Str(b)) => a == b,
            _ => false,
        }
    }

    /// Materialize as a runtime value. Strings share their payload.
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Nil => Value::Nil,
            Constant::Boolean(b) => Value::Boolean(*b),
            Constant::Integer(i) => Value::Integer(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Str(s) => Value::Str(s.clone()),
        }
    }
}

/// Where a closure finds one captured variable: in the enclosing frame's
/// registers (`in_stack`) or in the enclosing closure's upvalue list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpvalDesc {
    pub in_stack: bool,
    pub index: u8,
}

/// Debug record for one local variable's live range.
#[derive(Clone, Debug)]
pub struct LocalVar {
    pub name: LuaStr,
    pub start_pc: u32,
    pub end_pc: u32,
}

/// An immutable compiled function.
#[derive(Debug, Default)]
pub struct Prototype {
    /// Chunk name this function came from.
    pub source: LuaStr,
    /// First and last line of the function definition (0 for the main chunk).
    pub line_defined: u32,
    pub last_line_defined: u32,
    pub num_params: u8,
    pub is_vararg: bool,
    /// Registers the function needs; the frame is sized from this.
    pub max_stack_size: u8,
    pub code: Vec<Instruction>,
    pub constants: Vec<Constant>,
    pub upvalues: Vec<UpvalDesc>,
    pub protos: Vec<Rc<Prototype>>,
    /// Source line per instruction (parallel to `code`).
    pub line_info: Vec<u32>,
    /// Local-variable debug records, in declaration order.
    pub loc_vars: Vec<LocalVar>,
    /// Upvalue debug names (parallel to `upvalues`; may be empty).
    pub upvalue_names: Vec<LuaStr>,
}

impl Prototype {
    /// Source line for a pc, or 0 when debug info is stripped.
    pub fn line_for(&self, pc: usize) -> u32 {
        self.line_info.get(pc).copied().unwrap_or(0)
    }
}
