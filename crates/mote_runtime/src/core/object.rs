//! Object, function, and property cell layouts.
//!
//! Objects keep their properties as a singly linked chain of property cells
//! in insertion order; new properties append at the tail so enumeration is
//! deterministic. Arrays are ordinary objects with a cached element count.

use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use mote_ir::FuncBody;

use crate::core::strings::Str;
use crate::core::value::{PropId, Value};
use crate::errors::Error;

/// Property attribute bits. They share the wire values used by the
/// script-visible property API.
pub mod attr {
    /// Writes are silently ignored.
    pub const READ_ONLY: u8 = 1 << 0;
    /// Hidden from enumeration and JSON output.
    pub const DONT_ENUM: u8 = 1 << 1;
    /// Deletion is ignored.
    pub const DONT_DELETE: u8 = 1 << 2;
    /// The value is an internal slot, never script visible.
    pub const HIDDEN: u8 = 1 << 3;
    /// Reads go through a getter function.
    pub const GETTER: u8 = 1 << 4;
    /// Writes go through a setter function.
    pub const SETTER: u8 = 1 << 5;

    pub const ACCESSOR: u8 = GETTER | SETTER;
}

#[derive(Debug)]
pub enum ObjKind {
    Plain,
    Array,
    /// An Error object built by `throw` helpers; carries no extra state,
    /// the message and stack live in ordinary properties.
    Error,
    Regexp(Box<regex::Regex>),
}

impl ObjKind {
    pub fn is_array(&self) -> bool {
        matches!(self, ObjKind::Array)
    }
}

/// One object arena cell.
pub struct ObjCell {
    pub kind: ObjKind,
    pub proto: Value,
    /// Head of the property chain, `None` for an empty object.
    pub props: Option<PropId>,
    /// Cached element count for arrays; unused for plain objects.
    pub array_len: u32,
}

impl ObjCell {
    pub fn new(kind: ObjKind, proto: Value) -> Self {
        Self {
            kind,
            proto,
            props: None,
            array_len: 0,
        }
    }
}

/// One property arena cell.
pub struct PropRec {
    pub name: Str,
    pub value: Value,
    pub attrs: u8,
    pub next: Option<PropId>,
}

/// A host function callable from script. Receives the runtime, the
/// receiver (`this`), and the argument values.
pub type NativeFn =
    fn(&mut crate::runtime::Runtime, Value, &[Value]) -> Result<Value, Error>;

pub enum FuncKind {
    /// A closure over a compiled body and the scope it was created in.
    Script {
        body: Rc<FuncBody>,
        scope: Value,
    },
    /// An index into the runtime's native function table.
    Native(u32),
}

/// One function arena cell. `props` lets script code hang properties off
/// function values the way it does off objects.
pub struct FuncCell {
    pub kind: FuncKind,
    pub props: Option<PropId>,
}

impl FuncCell {
    pub fn script(body: Rc<FuncBody>, scope: Value) -> Self {
        Self {
            kind: FuncKind::Script { body, scope },
            props: None,
        }
    }

    pub fn native(index: u32) -> Self {
        Self {
            kind: FuncKind::Native(index),
            props: None,
        }
    }
}

/// Shared cancellation flag; setting it aborts the running script with an
/// interrupt exception at the next check point.
pub type InterruptFlag = Arc<AtomicBool>;
