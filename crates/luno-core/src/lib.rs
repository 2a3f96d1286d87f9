//! Luno core types: values, tables, prototypes, instruction encoding, and
//! the binary chunk format.

pub mod chunk;
pub mod error;
pub mod number;
pub mod opcode;
pub mod proto;
pub mod table;
pub mod value;
