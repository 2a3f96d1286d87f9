//! Runtime error type shared by the VM and native functions.

use crate::value::Value;
use std::fmt;

/// An error raised while executing bytecode or a native function.
#[derive(Clone, Debug)]
pub enum RuntimeError {
    /// A runtime fault with a human-readable message. Messages raised from
    /// bytecode carry a `source:line:` prefix added at raise time.
    Message(String),
    /// A non-string error value raised by `error(v)`; travels through
    /// `pcall` unchanged.
    Value(Value),
    /// Call depth exceeded the frame limit.
    StackOverflow,
}

impl RuntimeError {
    /// Build a plain message error.
    pub fn msg(message: impl Into<String>) -> RuntimeError {
        RuntimeError::Message(message.into())
    }

    /// The error as a Lua value, as `pcall` returns it.
    pub fn into_value(self) -> Value {
        match self {
            RuntimeError::Message(m) => Value::from_string(m),
            RuntimeError::Value(v) => v,
            RuntimeError::StackOverflow => Value::from_string("stack overflow".to_string()),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Message(m) => write!(f, "{m}"),
            RuntimeError::Value(v) => write!(f, "{v}"),
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
        }
    }
}

impl std::error::Error for RuntimeError {}
