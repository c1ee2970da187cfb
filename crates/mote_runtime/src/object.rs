//! Property access, prototype chains, and array operations.
//!
//! Properties hang off objects and functions as a linked chain in insertion
//! order. Reads walk the own chain first and then the prototype chain.
//! Writes respect READ_ONLY by silently succeeding without effect, so script
//! behavior matches property freezing done by the embedder.

use crate::core::object::{attr, FuncCell, ObjKind, PropRec};
use crate::core::strings::Str;
use crate::core::value::{PropId, Value};
use crate::errors::{messages, Error};
use crate::runtime::Runtime;

impl Runtime {
    fn props_head(&self, target: Value) -> Result<Option<PropId>, Error> {
        if target.is_object() {
            Ok(self.heap.obj(target.as_object()).props)
        } else if target.is_function() {
            Ok(self.heap.func(target.as_function()).props)
        } else {
            Err(Error::invalid_arg(messages::NOT_AN_OBJECT))
        }
    }

    fn set_props_head(&mut self, target: Value, head: Option<PropId>) {
        if target.is_object() {
            self.heap.obj_mut(target.as_object()).props = head;
        } else {
            self.heap.func_mut(target.as_function()).props = head;
        }
    }

    /// Find a property on the own chain, ignoring prototypes.
    pub(crate) fn find_own(&self, target: Value, name: &str) -> Result<Option<PropId>, Error> {
        let mut cursor = self.props_head(target)?;
        while let Some(pid) = cursor {
            let prop = self.heap.prop(pid);
            if prop.name.as_str() == name {
                return Ok(Some(pid));
            }
            cursor = prop.next;
        }
        Ok(None)
    }

    /// Read a property, walking the prototype chain and invoking getters.
    pub fn get_prop(&mut self, target: Value, name: &str) -> Result<Value, Error> {
        if target.is_object()
            && self.heap.obj(target.as_object()).kind.is_array()
            && name == "length"
        {
            let len = self.heap.obj(target.as_object()).array_len;
            return Ok(Value::number(len as f64));
        }
        let mut holder = target;
        loop {
            if let Some(pid) = self.find_own(holder, name)? {
                let prop = self.heap.prop(pid);
                let (value, attrs) = (prop.value, prop.attrs);
                if attrs & attr::GETTER != 0 {
                    let getter = if attrs & attr::SETTER != 0 {
                        self.array_get(value, 0)?
                    } else {
                        value
                    };
                    return self.apply(getter, target, &[]);
                }
                return Ok(value);
            }
            if !holder.is_object() {
                return Ok(Value::UNDEFINED);
            }
            let proto = self.heap.obj(holder.as_object()).proto;
            if !proto.is_object() {
                return Ok(Value::UNDEFINED);
            }
            holder = proto;
        }
    }

    /// Write a property. Creates it at the chain tail when absent so
    /// enumeration stays in insertion order.
    pub fn set_prop(&mut self, target: Value, name: &str, value: Value) -> Result<(), Error> {
        self.set_prop_attrs(target, name, value, 0)
    }

    pub fn set_prop_attrs(
        &mut self,
        target: Value,
        name: &str,
        value: Value,
        attrs: u8,
    ) -> Result<(), Error> {
        if target.is_object() && self.heap.obj(target.as_object()).kind.is_array() {
            if name == "length" {
                return self.array_set_length(target, value);
            }
            if let Some(index) = parse_array_index(name) {
                let cell = self.heap.obj_mut(target.as_object());
                if index >= cell.array_len {
                    cell.array_len = index + 1;
                }
            }
        }
        if let Some(pid) = self.find_own(target, name)? {
            let prop = self.heap.prop(pid);
            let (old, old_attrs) = (prop.value, prop.attrs);
            if old_attrs & attr::READ_ONLY != 0 {
                // Silent success, matching host-frozen properties.
                return Ok(());
            }
            if old_attrs & attr::SETTER != 0 {
                let setter = if old_attrs & attr::GETTER != 0 {
                    self.array_get(old, 1)?
                } else {
                    old
                };
                self.apply(setter, target, &[value])?;
                return Ok(());
            }
            if old_attrs & attr::GETTER != 0 {
                // A getter with no setter rejects writes the way READ_ONLY
                // does, keeping the stored function intact.
                return Ok(());
            }
            let prop = self.heap.prop_mut(pid);
            prop.value = value;
            if attrs != 0 {
                prop.attrs = attrs;
            }
            return Ok(());
        }
        self.append_prop(target, Str::from_str(name), value, attrs)
    }

    fn append_prop(
        &mut self,
        target: Value,
        name: Str,
        value: Value,
        attrs: u8,
    ) -> Result<(), Error> {
        // Root the participants: allocating the record can collect.
        self.gc_temp_roots.push(target);
        self.gc_temp_roots.push(value);
        let allocated = self.alloc_prop(PropRec {
            name,
            value,
            attrs,
            next: None,
        });
        self.gc_temp_roots.pop();
        self.gc_temp_roots.pop();
        let pid = allocated?;

        match self.props_head(target)? {
            None => self.set_props_head(target, Some(pid)),
            Some(head) => {
                let mut tail = head;
                while let Some(next) = self.heap.prop(tail).next {
                    tail = next;
                }
                self.heap.prop_mut(tail).next = Some(pid);
            }
        }
        Ok(())
    }

    /// Unlink a property. Returns whether one was removed; DONT_DELETE
    /// properties stay and report false. The unlinked record is not released
    /// here; the next sweep reclaims it along with any other unreachable
    /// cell.
    pub fn del_prop(&mut self, target: Value, name: &str) -> Result<bool, Error> {
        let mut prev: Option<PropId> = None;
        let mut cursor = self.props_head(target)?;
        while let Some(pid) = cursor {
            let prop = self.heap.prop(pid);
            if prop.name.as_str() == name {
                if prop.attrs & attr::DONT_DELETE != 0 {
                    return Ok(false);
                }
                let next = prop.next;
                match prev {
                    None => self.set_props_head(target, next),
                    Some(p) => self.heap.prop_mut(p).next = next,
                }
                return Ok(true);
            }
            prev = Some(pid);
            cursor = prop.next;
        }
        Ok(false)
    }

    /// Own enumerable properties in insertion order. DONT_ENUM and HIDDEN
    /// records are skipped; getter values are returned raw.
    pub fn enumerate(&self, target: Value) -> Result<Vec<(String, Value)>, Error> {
        let mut out = Vec::new();
        let mut cursor = self.props_head(target)?;
        while let Some(pid) = cursor {
            let prop = self.heap.prop(pid);
            if prop.attrs & (attr::DONT_ENUM | attr::HIDDEN) == 0 {
                out.push((prop.name.as_str().to_string(), prop.value));
            }
            cursor = prop.next;
        }
        Ok(out)
    }

    /// Attributes of an own property, when present.
    pub fn prop_attrs(&self, target: Value, name: &str) -> Result<Option<u8>, Error> {
        Ok(self.find_own(target, name)?.map(|pid| self.heap.prop(pid).attrs))
    }

    /// Replace the prototype. Returns the previous one. A chain that would
    /// loop back to `target` is rejected.
    pub fn set_proto(&mut self, target: Value, proto: Value) -> Result<Value, Error> {
        if !target.is_object() {
            return Err(Error::invalid_arg(messages::NOT_AN_OBJECT));
        }
        let mut cursor = proto;
        while cursor.is_object() {
            if cursor == target {
                return Err(Error::invalid_arg(messages::PROTO_CYCLE));
            }
            cursor = self.heap.obj(cursor.as_object()).proto;
        }
        let cell = self.heap.obj_mut(target.as_object());
        let prev = cell.proto;
        cell.proto = proto;
        Ok(prev)
    }

    pub fn get_proto(&self, target: Value) -> Result<Value, Error> {
        if !target.is_object() {
            return Err(Error::invalid_arg(messages::NOT_AN_OBJECT));
        }
        Ok(self.heap.obj(target.as_object()).proto)
    }

    /// Whether `v` sits below `ctor` on its prototype chain. A function is
    /// resolved through its `prototype` property first, matching
    /// constructor-style checks; an object is compared against directly.
    pub fn is_instance_of(&mut self, v: Value, ctor: Value) -> Result<bool, Error> {
        let proto = if ctor.is_function() {
            self.get_prop(ctor, "prototype")?
        } else {
            ctor
        };
        if !proto.is_object() {
            return Err(Error::invalid_arg(messages::NOT_AN_OBJECT));
        }
        if !v.is_object() {
            return Ok(false);
        }
        let mut cursor = self.heap.obj(v.as_object()).proto;
        while cursor.is_object() {
            if cursor == proto {
                return Ok(true);
            }
            cursor = self.heap.obj(cursor.as_object()).proto;
        }
        Ok(false)
    }

    /// Register a native function as a method on `target`.
    pub fn set_method(
        &mut self,
        target: Value,
        name: &str,
        f: crate::core::object::NativeFn,
    ) -> Result<(), Error> {
        let index = self.natives.len() as u32;
        self.natives.push(f);
        let id = self.alloc_func(FuncCell::native(index))?;
        self.set_prop_attrs(target, name, Value::function(id), attr::DONT_ENUM)
    }

    // ---- arrays ------------------------------------------------------------

    pub fn is_array(&self, v: Value) -> bool {
        v.is_object() && self.heap.obj(v.as_object()).kind.is_array()
    }

    pub fn array_length(&self, arr: Value) -> Result<u32, Error> {
        if !self.is_array(arr) {
            return Err(Error::invalid_arg(messages::NOT_AN_ARRAY));
        }
        Ok(self.heap.obj(arr.as_object()).array_len)
    }

    pub fn array_get(&mut self, arr: Value, index: u32) -> Result<Value, Error> {
        let mut buf = itoa::Buffer::new();
        self.get_prop(arr, buf.format(index))
    }

    pub fn array_set(&mut self, arr: Value, index: u32, value: Value) -> Result<(), Error> {
        if !self.is_array(arr) {
            return Err(Error::invalid_arg(messages::NOT_AN_ARRAY));
        }
        let mut buf = itoa::Buffer::new();
        self.set_prop(arr, buf.format(index), value)
    }

    pub fn array_push(&mut self, arr: Value, value: Value) -> Result<u32, Error> {
        let len = self.array_length(arr)?;
        self.array_set(arr, len, value)?;
        Ok(len + 1)
    }

    /// Assigning `length` truncates: element records at or past the new
    /// length are unlinked.
    fn array_set_length(&mut self, arr: Value, value: Value) -> Result<(), Error> {
        let new_len = value.try_number()? as u32;
        let old_len = self.heap.obj(arr.as_object()).array_len;
        for index in new_len..old_len {
            let mut buf = itoa::Buffer::new();
            self.del_prop(arr, buf.format(index))?;
        }
        self.heap.obj_mut(arr.as_object()).array_len = new_len;
        Ok(())
    }
}

/// Canonical array-index keys only: digits with no leading zero.
pub(crate) fn parse_array_index(name: &str) -> Option<u32> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

impl Runtime {
    pub fn is_regexp(&self, v: Value) -> bool {
        v.is_object()
            && matches!(self.heap.obj(v.as_object()).kind, ObjKind::Regexp(_))
    }

    /// Test a Regexp object against `text`.
    pub fn regexp_test(&self, re: Value, text: &str) -> Result<bool, Error> {
        if !re.is_object() {
            return Err(Error::invalid_arg(messages::NOT_AN_OBJECT));
        }
        match &self.heap.obj(re.as_object()).kind {
            ObjKind::Regexp(compiled) => Ok(compiled.is_match(text)),
            _ => Err(Error::invalid_arg(messages::BAD_REGEXP)),
        }
    }
}
