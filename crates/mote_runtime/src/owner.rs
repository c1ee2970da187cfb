//! The ownership registry.
//!
//! Embedders that hold values across script execution register them here so
//! the collector treats them as roots. A `Root` is a shared cell: the
//! registry and the embedder both see the same slot, so a future compacting
//! collector could rewrite the value in place without breaking the handle.

use std::cell::Cell;
use std::rc::Rc;

use crate::core::value::Value;

/// An owned reference to a managed value, alive until disowned.
#[derive(Clone)]
pub struct Root(Rc<Cell<Value>>);

impl Root {
    pub fn get(&self) -> Value {
        self.0.get()
    }

    pub fn set(&self, v: Value) {
        self.0.set(v);
    }
}

#[derive(Default)]
pub struct OwnedSlots {
    slots: Vec<Rc<Cell<Value>>>,
}

impl OwnedSlots {
    pub fn own(&mut self, v: Value) -> Root {
        let slot = Rc::new(Cell::new(v));
        self.slots.push(Rc::clone(&slot));
        Root(slot)
    }

    /// Drop the most recently registered slot for this root. Returns false
    /// if the root was never owned (or already disowned).
    pub fn disown(&mut self, root: &Root) -> bool {
        let pos = self
            .slots
            .iter()
            .rposition(|slot| Rc::ptr_eq(slot, &root.0));
        match pos {
            Some(i) => {
                self.slots.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn iter_values(&self) -> impl Iterator<Item = Value> + '_ {
        self.slots.iter().map(|slot| slot.get())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disown_removes_most_recent_registration() {
        let mut owned = OwnedSlots::default();
        let a = owned.own(Value::number(1.0));
        let b = owned.own(Value::number(2.0));
        assert_eq!(owned.len(), 2);
        assert!(owned.disown(&b));
        assert!(owned.disown(&a));
        assert!(!owned.disown(&a));
        assert!(owned.is_empty());
    }

    #[test]
    fn root_updates_are_visible_to_the_registry() {
        let mut owned = OwnedSlots::default();
        let root = owned.own(Value::NULL);
        root.set(Value::TRUE);
        let seen: Vec<Value> = owned.iter_values().collect();
        assert_eq!(seen, vec![Value::TRUE]);
    }
}
