//! mote_ir: compiled units for the mote runtime.
//!
//! Scans and parses a small script surface into an owned AST (`Unit`), which
//! is what the runtime executes. Units can be dumped in a human-readable text
//! form or round-tripped through a versioned binary format meant only for
//! reloading by the same runtime version.
//!
//! Entry points: `compile`, `Unit::dump_text`, `Unit::to_bytes`,
//! `Unit::from_bytes`.

mod ast;
mod binary;
mod dump;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr, FuncBody, IfStmt, Stmt, TryStmt, UnaryOp, Unit, WhileStmt};
pub use binary::DecodeError;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{CompileError, Limits, SyntaxError, compile};
