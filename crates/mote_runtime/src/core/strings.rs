//! String storage: a small-string text type and the managed string heap.
//!
//! `Str` keeps payloads up to `INLINE_CAP` bytes inline in the record, with
//! no allocation; longer strings spill to an owned `String`. String values
//! live in `StringHeap` slots addressed by `StrId` and are reclaimed by the
//! collector when no live cell or root references them.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::str;

use crate::core::heap::MarkSet;
use crate::core::value::StrId;

pub const INLINE_CAP: usize = 22;

#[derive(Clone)]
pub enum Str {
    Inline { len: u8, buf: [u8; INLINE_CAP] },
    Spilled(String),
}

impl Str {
    pub fn new() -> Self {
        Str::Inline {
            len: 0,
            buf: [0u8; INLINE_CAP],
        }
    }

    pub fn from_str(s: &str) -> Self {
        if s.len() <= INLINE_CAP {
            let mut buf = [0u8; INLINE_CAP];
            buf[..s.len()].copy_from_slice(s.as_bytes());
            return Str::Inline {
                len: s.len() as u8,
                buf,
            };
        }
        Str::Spilled(s.to_string())
    }

    pub fn from_string(s: String) -> Self {
        if s.len() <= INLINE_CAP {
            return Self::from_str(&s);
        }
        Str::Spilled(s)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Str::Inline { len, buf } => {
                let bytes = &buf[..*len as usize];
                // Inline bytes always come from a valid &str.
                unsafe { str::from_utf8_unchecked(bytes) }
            }
            Str::Spilled(s) => s.as_str(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Str::Inline { len, .. } => *len as usize,
            Str::Spilled(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        match self {
            Str::Inline { len, buf } => {
                let cur = *len as usize;
                let new_len = cur + s.len();
                if new_len <= INLINE_CAP {
                    buf[cur..new_len].copy_from_slice(s.as_bytes());
                    *len = new_len as u8;
                    return;
                }
                let mut out = String::with_capacity(new_len);
                out.push_str(unsafe { str::from_utf8_unchecked(&buf[..cur]) });
                out.push_str(s);
                *self = Str::Spilled(out);
            }
            Str::Spilled(data) => data.push_str(s),
        }
    }

    pub fn concat2(a: &Str, b: &Str) -> Str {
        let total = a.len() + b.len();
        if total <= INLINE_CAP {
            let mut buf = [0u8; INLINE_CAP];
            buf[..a.len()].copy_from_slice(a.as_str().as_bytes());
            buf[a.len()..total].copy_from_slice(b.as_str().as_bytes());
            return Str::Inline {
                len: total as u8,
                buf,
            };
        }
        let mut out = String::with_capacity(total);
        out.push_str(a.as_str());
        out.push_str(b.as_str());
        Str::Spilled(out)
    }

    /// Append a number formatted the way script-visible printing does:
    /// integral values without a fractional part, the rest through `ryu`.
    pub fn push_f64(&mut self, f: f64) {
        if f.fract() == 0.0 && f.is_finite() && f.abs() < 9e15 {
            let mut buf = itoa::Buffer::new();
            self.push_str(buf.format(f as i64));
        } else {
            let mut buf = ryu::Buffer::new();
            self.push_str(buf.format(f));
        }
    }

    /// Bytes kept outside the record itself.
    pub fn spilled_bytes(&self) -> usize {
        match self {
            Str::Inline { .. } => 0,
            Str::Spilled(s) => s.capacity(),
        }
    }
}

impl Default for Str {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Str {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Str {}

impl Hash for Str {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().as_bytes().hash(state);
    }
}

impl fmt::Debug for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Str {
    fn from(value: &str) -> Self {
        Str::from_str(value)
    }
}

impl From<String> for Str {
    fn from(value: String) -> Self {
        Str::from_string(value)
    }
}

impl AsRef<str> for Str {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Str {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

/// The managed heap for string values.
pub struct StringHeap {
    slots: Vec<Option<Str>>,
    free: Vec<u32>,
    used_bytes: usize,
}

impl StringHeap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            used_bytes: 0,
        }
    }

    pub fn alloc(&mut self, s: Str) -> StrId {
        self.used_bytes += slot_bytes(&s);
        if let Some(i) = self.free.pop() {
            self.slots[i as usize] = Some(s);
            StrId(i)
        } else {
            let i = self.slots.len() as u32;
            self.slots.push(Some(s));
            StrId(i)
        }
    }

    pub fn get(&self, id: StrId) -> &Str {
        self.slots[id.0 as usize]
            .as_ref()
            .expect("string was garbage collected")
    }

    pub fn contains(&self, id: StrId) -> bool {
        self.slots
            .get(id.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    /// Free every slot the mark phase did not reach. A full collection also
    /// trims trailing empty slots so the backing vector shrinks.
    pub fn sweep(&mut self, marks: &MarkSet, full: bool) {
        for i in 0..self.slots.len() {
            if let Some(s) = &self.slots[i] {
                if !marks.contains(i as u32) {
                    self.used_bytes -= slot_bytes(s);
                    self.slots[i] = None;
                    self.free.push(i as u32);
                }
            }
        }
        if full {
            while self.slots.last().is_some_and(|s| s.is_none()) {
                self.slots.pop();
            }
            let len = self.slots.len() as u32;
            self.free.retain(|&i| i < len);
            self.slots.shrink_to_fit();
            self.free.shrink_to_fit();
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn reserved_bytes(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<Option<Str>>()
            + self
                .slots
                .iter()
                .flatten()
                .map(|s| s.spilled_bytes())
                .sum::<usize>()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

fn slot_bytes(s: &Str) -> usize {
    std::mem::size_of::<Str>() + s.spilled_bytes()
}
