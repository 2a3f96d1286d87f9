//! The top-level error for loading and running chunks.

use luno_compiler::CompileError;
use luno_core::chunk::FormatError;
use luno_core::error::RuntimeError;
use std::fmt;

/// Anything that can go wrong between a chunk's bytes and its results:
/// the source didn't compile, a binary chunk didn't validate, or the
/// code raised at runtime.
#[derive(Clone, Debug)]
pub enum LuaError {
    Compile(CompileError),
    Format(FormatError),
    Runtime(RuntimeError),
}

impl fmt::Display for LuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaError::Compile(e) => write!(f, "{e}"),
            LuaError::Format(e) => write!(f, "{e}"),
            LuaError::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LuaError {}

impl From<CompileError> for LuaError {
    fn from(e: CompileError) -> LuaError {
        LuaError::Compile(e)
    }
}

impl From<FormatError> for LuaError {
    fn from(e: FormatError) -> LuaError {
        LuaError::Format(e)
    }
}

impl From<RuntimeError> for LuaError {
    fn from(e: RuntimeError) -> LuaError {
        LuaError::Runtime(e)
    }
}
