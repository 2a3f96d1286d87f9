//! Luno compiler: lexer, parser, and bytecode emitter for Lua 5.3 source.

pub mod ast;
pub mod disasm;
pub mod emit;
pub mod lexer;
pub mod parser;
pub mod token;

use std::fmt;
use std::rc::Rc;

use luno_core::proto::Prototype;

/// Error from any compilation stage, tagged with a source line.
#[derive(Clone, Debug, PartialEq)]
pub struct CompileError {
    pub message: String,
    pub line: u32,
}

impl CompileError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        CompileError {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.line, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Compile a source chunk into a prototype ready to load.
///
/// `chunk_name` becomes the prototype's source name, shown in error
/// messages and disassembly.
pub fn compile(source: &[u8], chunk_name: &str) -> Result<Rc<Prototype>, CompileError> {
    let block = parser::parse(source)?;
    let proto = emit::gen_proto(block, chunk_name)?;
    Ok(Rc::new(proto))
}
