//! Runtime value representation.
//!
//! Every runtime value is one 64-bit word using NaN-boxing: any bit pattern
//! that is not a tagged quiet NaN is a plain `f64`. Tags live in bits 48..51
//! above the all-ones exponent; the low 48 bits carry the payload (a heap
//! index, a boolean, or raw pointer bits).

use std::fmt;

use crate::errors::Error;
use crate::errors::messages;

pub const QNAN: u64 = 0x7ff8_0000_0000_0000;
pub const TAG_BASE: u64 = 0xfff0_0000_0000_0000;
pub const TAG_MASK: u64 = 0x000f_0000_0000_0000;
pub const PAYLOAD_MASK: u64 = 0x0000_ffff_ffff_ffff;

pub const TAG_NULL: u64 = 0x0001;
pub const TAG_UNDEF: u64 = 0x0002;
pub const TAG_BOOL: u64 = 0x0003;
pub const TAG_STR: u64 = 0x0004;
pub const TAG_OBJ: u64 = 0x0005;
pub const TAG_FUNC: u64 = 0x0006;
pub const TAG_FOREIGN: u64 = 0x0007;
pub const TAG_CFUNC: u64 = 0x0008;

/// Handle to a cell in the object arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(pub u32);

/// Handle to a cell in the function arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

/// Handle to a slot in the string heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrId(pub u32);

/// Handle to a cell in the property arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropId(pub u32);

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Value(u64);

impl Default for Value {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl Value {
    pub const NULL: Value = Value(TAG_BASE | (TAG_NULL << 48));
    pub const UNDEFINED: Value = Value(TAG_BASE | (TAG_UNDEF << 48));
    pub const TRUE: Value = Value(TAG_BASE | (TAG_BOOL << 48) | 1);
    pub const FALSE: Value = Value(TAG_BASE | (TAG_BOOL << 48));

    #[inline(always)]
    pub fn number(f: f64) -> Self {
        // Canonicalize every NaN to one quiet pattern so no arithmetic result
        // collides with the tag space.
        if f.is_nan() {
            return Self(QNAN);
        }
        Self(f.to_bits())
    }

    #[inline(always)]
    pub fn boolean(b: bool) -> Self {
        if b { Self::TRUE } else { Self::FALSE }
    }

    #[inline(always)]
    fn tagged(tag: u64, payload: u64) -> Self {
        Self(TAG_BASE | (tag << 48) | (payload & PAYLOAD_MASK))
    }

    pub fn object(id: ObjId) -> Self {
        Self::tagged(TAG_OBJ, id.0 as u64)
    }

    pub fn function(id: FuncId) -> Self {
        Self::tagged(TAG_FUNC, id.0 as u64)
    }

    pub fn string(id: StrId) -> Self {
        Self::tagged(TAG_STR, id.0 as u64)
    }

    /// Wrap a raw host pointer. Only the low 48 bits are stored, which covers
    /// canonical user-space addresses on 64-bit targets.
    pub fn foreign(ptr: *mut ()) -> Self {
        Self::tagged(TAG_FOREIGN, ptr as u64)
    }

    /// Wrap a native-callback table index (see `Runtime::create_cfunction`).
    pub(crate) fn cfunction(index: u32) -> Self {
        Self::tagged(TAG_CFUNC, index as u64)
    }

    #[inline(always)]
    fn tag(&self) -> u64 {
        if (self.0 & TAG_BASE) != TAG_BASE {
            return 0;
        }
        (self.0 & TAG_MASK) >> 48
    }

    // Minus-infinity (0xfff0_0000_0000_0000) shares the tag-zero prefix, so
    // tag zero always classifies as a number.
    #[inline(always)]
    pub fn is_number(&self) -> bool {
        self.tag() == 0
    }

    #[inline(always)]
    pub fn is_boolean(&self) -> bool {
        self.tag() == TAG_BOOL
    }

    #[inline(always)]
    pub fn is_null(&self) -> bool {
        self.tag() == TAG_NULL
    }

    #[inline(always)]
    pub fn is_undefined(&self) -> bool {
        self.tag() == TAG_UNDEF
    }

    #[inline(always)]
    pub fn is_string(&self) -> bool {
        self.tag() == TAG_STR
    }

    #[inline(always)]
    pub fn is_object(&self) -> bool {
        self.tag() == TAG_OBJ
    }

    #[inline(always)]
    pub fn is_function(&self) -> bool {
        self.tag() == TAG_FUNC
    }

    #[inline(always)]
    pub fn is_foreign(&self) -> bool {
        self.tag() == TAG_FOREIGN
    }

    #[inline(always)]
    pub fn is_cfunction(&self) -> bool {
        self.tag() == TAG_CFUNC
    }

    #[inline(always)]
    pub fn as_number(self) -> f64 {
        debug_assert!(self.is_number());
        f64::from_bits(self.0)
    }

    #[inline(always)]
    pub fn as_boolean(self) -> bool {
        debug_assert!(self.is_boolean());
        (self.0 & 1) != 0
    }

    #[inline(always)]
    pub fn as_object(self) -> ObjId {
        debug_assert!(self.is_object());
        ObjId((self.0 & PAYLOAD_MASK) as u32)
    }

    #[inline(always)]
    pub fn as_function(self) -> FuncId {
        debug_assert!(self.is_function());
        FuncId((self.0 & PAYLOAD_MASK) as u32)
    }

    #[inline(always)]
    pub fn as_string(self) -> StrId {
        debug_assert!(self.is_string());
        StrId((self.0 & PAYLOAD_MASK) as u32)
    }

    #[inline(always)]
    pub fn as_foreign(self) -> *mut () {
        debug_assert!(self.is_foreign());
        (self.0 & PAYLOAD_MASK) as *mut ()
    }

    #[inline(always)]
    pub(crate) fn as_cfunction(self) -> u32 {
        debug_assert!(self.is_cfunction());
        (self.0 & PAYLOAD_MASK) as u32
    }

    /// Checked decode for the host API: fails with `InvalidArg` instead of
    /// asserting when the kind does not match.
    pub fn try_number(self) -> Result<f64, Error> {
        if self.is_number() {
            Ok(f64::from_bits(self.0))
        } else {
            Err(Error::invalid_arg(messages::NOT_A_NUMBER))
        }
    }

    pub fn try_boolean(self) -> Result<bool, Error> {
        if self.is_boolean() {
            Ok((self.0 & 1) != 0)
        } else {
            Err(Error::invalid_arg(messages::NOT_A_BOOL))
        }
    }

    pub fn try_foreign(self) -> Result<*mut (), Error> {
        if self.is_foreign() {
            Ok((self.0 & PAYLOAD_MASK) as *mut ())
        } else {
            Err(Error::invalid_arg(messages::NOT_A_FOREIGN))
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.tag() {
            0 => "number",
            TAG_NULL => "null",
            TAG_UNDEF => "undefined",
            TAG_BOOL => "boolean",
            TAG_STR => "string",
            TAG_OBJ => "object",
            TAG_FUNC => "function",
            TAG_FOREIGN => "foreign",
            TAG_CFUNC => "cfunction",
            _ => "unknown",
        }
    }

    pub fn bits(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            0 => write!(f, "Number({})", f64::from_bits(self.0)),
            TAG_NULL => write!(f, "Null"),
            TAG_UNDEF => write!(f, "Undefined"),
            TAG_BOOL => write!(f, "Bool({})", (self.0 & 1) != 0),
            TAG_STR => write!(f, "Str(#{})", self.0 & PAYLOAD_MASK),
            TAG_OBJ => write!(f, "Obj(#{})", self.0 & PAYLOAD_MASK),
            TAG_FUNC => write!(f, "Func(#{})", self.0 & PAYLOAD_MASK),
            TAG_FOREIGN => write!(f, "Foreign({:#x})", self.0 & PAYLOAD_MASK),
            TAG_CFUNC => write!(f, "CFunc(#{})", self.0 & PAYLOAD_MASK),
            t => write!(f, "Unknown(tag={t})"),
        }
    }
}
