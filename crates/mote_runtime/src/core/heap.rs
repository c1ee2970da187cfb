//! Garbage collection and heap management.

use crate::core::arena::Arena;
use crate::core::config::CreateOpts;
use crate::core::object::{FuncCell, FuncKind, ObjCell, PropRec};
use crate::core::strings::{Str, StringHeap};
use crate::core::value::{FuncId, ObjId, PropId, StrId, Value};

/// Dense mark bitset keyed by arena handle.
#[derive(Default)]
pub struct MarkSet {
    words: Vec<u64>,
}

impl MarkSet {
    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn contains(&self, id: u32) -> bool {
        let word = (id >> 6) as usize;
        let bit = id & 63;
        self.words.get(word).is_some_and(|w| (w & (1 << bit)) != 0)
    }

    /// Returns false if the bit was already set.
    pub fn insert(&mut self, id: u32) -> bool {
        let word = (id >> 6) as usize;
        let bit = id & 63;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let w = &mut self.words[word];
        let mask = 1u64 << bit;
        if (*w & mask) != 0 {
            return false;
        }
        *w |= mask;
        true
    }
}

/// Counters updated by every collection.
#[derive(Debug, Default, Clone, Copy)]
pub struct GcCounters {
    pub collections: u64,
    pub full_collections: u64,
    pub objects_freed: u64,
    pub functions_freed: u64,
    pub properties_freed: u64,
    pub strings_freed: u64,
}

/// The managed heap: three fixed-cell arenas plus the string heap.
pub struct Heap {
    pub objects: Arena<ObjCell>,
    pub functions: Arena<FuncCell>,
    pub properties: Arena<PropRec>,
    pub strings: StringHeap,
    obj_marks: MarkSet,
    func_marks: MarkSet,
    prop_marks: MarkSet,
    str_marks: MarkSet,
    pub counters: GcCounters,
    /// Allocations since the last sweep, compared against the threshold to
    /// schedule a collection at the next statement boundary.
    alloc_tally: usize,
    gc_alloc_threshold: usize,
}

impl Heap {
    pub fn new(opts: &CreateOpts) -> Self {
        Self {
            objects: Arena::new(&opts.object_arena),
            functions: Arena::new(&opts.function_arena),
            properties: Arena::new(&opts.property_arena),
            strings: StringHeap::new(),
            obj_marks: MarkSet::default(),
            func_marks: MarkSet::default(),
            prop_marks: MarkSet::default(),
            str_marks: MarkSet::default(),
            counters: GcCounters::default(),
            alloc_tally: 0,
            gc_alloc_threshold: opts.gc_alloc_threshold,
        }
    }

    pub(crate) fn note_alloc(&mut self) {
        self.alloc_tally += 1;
    }

    pub fn should_gc(&self) -> bool {
        self.alloc_tally >= self.gc_alloc_threshold
    }

    pub fn obj(&self, id: ObjId) -> &ObjCell {
        self.objects.get(id.0)
    }

    pub fn obj_mut(&mut self, id: ObjId) -> &mut ObjCell {
        self.objects.get_mut(id.0)
    }

    pub fn func(&self, id: FuncId) -> &FuncCell {
        self.functions.get(id.0)
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut FuncCell {
        self.functions.get_mut(id.0)
    }

    pub fn prop(&self, id: PropId) -> &PropRec {
        self.properties.get(id.0)
    }

    pub fn prop_mut(&mut self, id: PropId) -> &mut PropRec {
        self.properties.get_mut(id.0)
    }

    pub fn str(&self, id: StrId) -> &Str {
        self.strings.get(id)
    }

    pub fn alloc_string(&mut self, s: Str) -> StrId {
        self.note_alloc();
        self.strings.alloc(s)
    }

    /// Mark every cell reachable from `roots`. Clears old marks first.
    pub fn mark_all(&mut self, roots: &[Value]) {
        self.obj_marks.clear();
        self.func_marks.clear();
        self.prop_marks.clear();
        self.str_marks.clear();

        let mut pending: Vec<Value> = roots.to_vec();
        while let Some(val) = pending.pop() {
            if val.is_object() {
                let id = val.as_object();
                if !self.objects.contains(id.0) || !self.obj_marks.insert(id.0) {
                    continue;
                }
                let cell = self.objects.get(id.0);
                let (proto, props) = (cell.proto, cell.props);
                pending.push(proto);
                self.mark_prop_chain(props, &mut pending);
            } else if val.is_function() {
                let id = val.as_function();
                if !self.functions.contains(id.0) || !self.func_marks.insert(id.0) {
                    continue;
                }
                let cell = self.functions.get(id.0);
                if let FuncKind::Script { scope, .. } = &cell.kind {
                    pending.push(*scope);
                }
                let props = cell.props;
                self.mark_prop_chain(props, &mut pending);
            } else if val.is_string() {
                self.str_marks.insert(val.as_string().0);
            }
        }
    }

    fn mark_prop_chain(&mut self, head: Option<PropId>, pending: &mut Vec<Value>) {
        let mut cursor = head;
        while let Some(pid) = cursor {
            if !self.prop_marks.insert(pid.0) {
                break;
            }
            let prop = self.properties.get(pid.0);
            pending.push(prop.value);
            cursor = prop.next;
        }
    }

    /// Free everything the mark phase did not reach. A full collection
    /// additionally releases wholly empty arena blocks and trims the
    /// string heap.
    pub fn sweep(&mut self, full: bool) {
        let unreached_objs: Vec<u32> = self
            .objects
            .iter_handles()
            .filter(|&h| !self.obj_marks.contains(h))
            .collect();
        for h in unreached_objs {
            self.objects.free(h);
            self.counters.objects_freed += 1;
        }

        let unreached_funcs: Vec<u32> = self
            .functions
            .iter_handles()
            .filter(|&h| !self.func_marks.contains(h))
            .collect();
        for h in unreached_funcs {
            self.functions.free(h);
            self.counters.functions_freed += 1;
        }

        let unreached_props: Vec<u32> = self
            .properties
            .iter_handles()
            .filter(|&h| !self.prop_marks.contains(h))
            .collect();
        for h in unreached_props {
            self.properties.free(h);
            self.counters.properties_freed += 1;
        }

        let strings_before = self.strings.live_count();
        self.strings.sweep(&self.str_marks, full);
        self.counters.strings_freed += (strings_before - self.strings.live_count()) as u64;

        if full {
            self.objects.release_empty_blocks();
            self.functions.release_empty_blocks();
            self.properties.release_empty_blocks();
            self.counters.full_collections += 1;
        }
        self.counters.collections += 1;
        self.alloc_tally = 0;

        self.obj_marks.clear();
        self.func_marks.clear();
        self.prop_marks.clear();
        self.str_marks.clear();
    }

    /// Bytes occupied by live cells.
    pub fn used_bytes(&self) -> usize {
        self.objects.live_count() * std::mem::size_of::<ObjCell>()
            + self.functions.live_count() * std::mem::size_of::<FuncCell>()
            + self.properties.live_count() * std::mem::size_of::<PropRec>()
            + self
                .properties
                .iter_handles()
                .map(|h| self.properties.get(h).name.spilled_bytes())
                .sum::<usize>()
    }

    /// Bytes reserved by every arena block, live or not.
    pub fn reserved_bytes(&self) -> usize {
        self.objects.cell_count() * std::mem::size_of::<Option<ObjCell>>()
            + self.functions.cell_count() * std::mem::size_of::<Option<FuncCell>>()
            + self.properties.cell_count() * std::mem::size_of::<Option<PropRec>>()
    }
}
