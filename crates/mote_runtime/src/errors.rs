//! Error taxonomy and common message constants.

use std::fmt;

use mote_ir::SyntaxError;

use crate::core::value::Value;

/// Outcome discriminant for every fallible host entry point.
///
/// `Syntax` means the input was rejected before any execution. `Exception` is
/// a thrown script value, recoverable by the embedder. `StackOverflow`,
/// `UnitTooLarge` and `OutOfMemory` abort the in-flight call chain but leave
/// the runtime usable. `InvalidArg` is a host API contract violation and is
/// reported without throwing.
#[derive(Clone, Debug)]
pub enum Error {
    Syntax(SyntaxError),
    Exception(Value),
    StackOverflow,
    UnitTooLarge { nodes: usize, limit: usize },
    InvalidArg(&'static str),
    OutOfMemory,
}

impl Error {
    pub(crate) fn invalid_arg(msg: &'static str) -> Self {
        Error::InvalidArg(msg)
    }

    pub(crate) fn syntax(line: u32, col: u32, message: impl Into<String>) -> Self {
        Error::Syntax(SyntaxError {
            line,
            col,
            message: message.into(),
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax(e) => write!(f, "syntax error: {e}"),
            Error::Exception(v) => write!(f, "uncaught exception: {v:?}"),
            Error::StackOverflow => write!(f, "call stack overflow"),
            Error::UnitTooLarge { nodes, limit } => {
                write!(f, "compiled unit too large: {nodes} nodes (limit {limit})")
            }
            Error::InvalidArg(msg) => write!(f, "invalid argument: {msg}"),
            Error::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl std::error::Error for Error {}

pub mod messages {
    pub const NOT_A_NUMBER: &str = "not a number";
    pub const NOT_A_BOOL: &str = "not a boolean";
    pub const NOT_A_STRING: &str = "not a string";
    pub const NOT_AN_OBJECT: &str = "not an object";
    pub const NOT_A_FUNCTION: &str = "not a function";
    pub const NOT_A_FOREIGN: &str = "not a foreign pointer";
    pub const NOT_AN_ARRAY: &str = "not an array";
    pub const PROTO_CYCLE: &str = "prototype chain would form a cycle";
    pub const BAD_REGEXP: &str = "invalid regular expression";
    pub const CYCLIC_JSON: &str = "cannot render a cyclic value as JSON";
}
