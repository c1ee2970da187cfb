//! Garbage collection operations for the Runtime.

use crate::core::object::{FuncCell, ObjCell, PropRec};
use crate::core::value::{FuncId, ObjId, PropId, Value};
use crate::errors::Error;
use crate::runtime::Runtime;

impl Runtime {
    /// Gather every root the collector must trace: the global object, the
    /// ownership registry, interpreter temporaries, and live call frames.
    fn collect_roots(&self) -> Vec<Value> {
        let estimated = 1
            + self.owned.len()
            + self.gc_temp_roots.len()
            + self.frames.len() * 4
            + 16;
        let mut roots: Vec<Value> = Vec::with_capacity(estimated);
        roots.push(self.global);
        roots.extend(self.owned.iter_values());
        roots.extend_from_slice(&self.gc_temp_roots);
        for frame in &self.frames {
            roots.push(frame.func);
            roots.push(frame.this);
            roots.push(frame.scope);
            roots.extend_from_slice(&frame.args);
        }
        roots
    }

    /// Run a collection. A full collection also returns wholly empty arena
    /// blocks to the allocator and trims the string heap.
    pub fn gc(&mut self, full: bool) {
        let roots = self.collect_roots();
        self.heap.mark_all(&roots);
        self.heap.sweep(full);
        self.interns
            .retain(|_, id| self.heap.strings.contains(*id));
    }

    /// Collect when the allocation tally has crossed the configured
    /// threshold. Called at statement boundaries, where every live value is
    /// reachable from a root.
    pub(crate) fn maybe_gc(&mut self) {
        if self.heap.should_gc() {
            self.gc(false);
        }
    }

    pub(crate) fn alloc_obj(&mut self, cell: ObjCell) -> Result<ObjId, Error> {
        self.heap.note_alloc();
        match self.heap.objects.alloc(cell) {
            Ok(h) => Ok(ObjId(h)),
            Err(cell) => {
                self.gc(true);
                match self.heap.objects.alloc(cell) {
                    Ok(h) => Ok(ObjId(h)),
                    Err(_) => Err(Error::OutOfMemory),
                }
            }
        }
    }

    pub(crate) fn alloc_func(&mut self, cell: FuncCell) -> Result<FuncId, Error> {
        self.heap.note_alloc();
        match self.heap.functions.alloc(cell) {
            Ok(h) => Ok(FuncId(h)),
            Err(cell) => {
                self.gc(true);
                match self.heap.functions.alloc(cell) {
                    Ok(h) => Ok(FuncId(h)),
                    Err(_) => Err(Error::OutOfMemory),
                }
            }
        }
    }

    pub(crate) fn alloc_prop(&mut self, rec: PropRec) -> Result<PropId, Error> {
        self.heap.note_alloc();
        match self.heap.properties.alloc(rec) {
            Ok(h) => Ok(PropId(h)),
            Err(rec) => {
                self.gc(true);
                match self.heap.properties.alloc(rec) {
                    Ok(h) => Ok(PropId(h)),
                    Err(_) => Err(Error::OutOfMemory),
                }
            }
        }
    }
}
