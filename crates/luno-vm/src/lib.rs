//! Luno virtual machine: a register interpreter for the compiler's
//! bytecode, with metamethod dispatch and the base library.

pub mod arith;
pub mod coerce;
pub mod compare;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod metamethod;
pub mod stdlib;
pub mod vm;

use error::LuaError;
use luno_core::value::Value;
use vm::Vm;

/// Compile and execute Lua source code, returning the chunk's results.
pub fn execute_source(source: &str) -> Result<Vec<Value>, LuaError> {
    let mut vm = Vm::new();
    let main = vm.load_chunk(source.as_bytes(), "=input")?;
    Ok(vm.call(main, Vec::new())?)
}
