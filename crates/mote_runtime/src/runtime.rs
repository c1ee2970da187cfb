//! The runtime instance and its public surface.

use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mote_ir::{CompileError, Limits, SyntaxError, Unit};

use crate::core::config::{CreateOpts, HeapStat};
use crate::core::heap::Heap;
use crate::core::object::{attr, FuncCell, InterruptFlag, NativeFn, ObjCell, ObjKind};
use crate::core::strings::Str;
use crate::core::value::Value;
use crate::errors::{messages, Error};
use crate::frames::Frame;
use crate::owner::{OwnedSlots, Root};
use crate::util::{fast_map_new, FastHashMap};

/// A `Send + Sync` handle that cancels a running script from another
/// thread. The interpreter notices at its next check point and throws an
/// Error object with message "Interrupted".
#[derive(Clone)]
pub struct InterruptHandle(InterruptFlag);

impl InterruptHandle {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Runtime {
    pub(crate) heap: Heap,
    pub(crate) global: Value,
    pub(crate) owned: OwnedSlots,
    pub(crate) natives: Vec<NativeFn>,
    /// Values the interpreter must keep alive across nested allocations.
    pub(crate) gc_temp_roots: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) interrupt: InterruptFlag,
    /// Statement countdown until the next interrupt-flag check.
    pub(crate) interrupt_budget: u32,
    /// Current expression nesting across the active call chain.
    pub(crate) eval_depth: usize,
    pub(crate) opts: CreateOpts,
    pub(crate) limits: Limits,
    pub(crate) last_parse_error: Option<SyntaxError>,
    /// Weak intern table for string values; pruned after every sweep.
    pub(crate) interns: FastHashMap<Str, crate::core::value::StrId>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_opts(CreateOpts::default())
    }

    pub fn with_opts(opts: CreateOpts) -> Self {
        let mut heap = Heap::new(&opts);
        let global = match heap.objects.alloc(ObjCell::new(ObjKind::Plain, Value::NULL)) {
            Ok(h) => Value::object(crate::core::value::ObjId(h)),
            // The first block always has room for the first cell.
            Err(_) => unreachable!("fresh arena rejected first allocation"),
        };
        Self {
            heap,
            global,
            owned: OwnedSlots::default(),
            natives: Vec::new(),
            gc_temp_roots: Vec::new(),
            frames: Vec::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
            interrupt_budget: opts.interrupt_interval.max(1),
            eval_depth: 0,
            opts,
            limits: Limits::default(),
            last_parse_error: None,
            interns: fast_map_new(),
        }
    }

    /// The global object. Script top-level variables are its properties.
    pub fn global(&self) -> Value {
        self.global
    }

    // ---- value constructors ------------------------------------------------

    pub fn create_object(&mut self) -> Result<Value, Error> {
        self.create_object_with_proto(Value::NULL)
    }

    pub fn create_object_with_proto(&mut self, proto: Value) -> Result<Value, Error> {
        // The proto must survive a collection triggered by this allocation.
        self.gc_temp_roots.push(proto);
        let id = self.alloc_obj(ObjCell::new(ObjKind::Plain, proto));
        self.gc_temp_roots.pop();
        Ok(Value::object(id?))
    }

    pub fn create_array(&mut self) -> Result<Value, Error> {
        let id = self.alloc_obj(ObjCell::new(ObjKind::Array, Value::NULL))?;
        Ok(Value::object(id))
    }

    /// An Error object with a `message` property and a captured `stack`
    /// trace.
    pub fn create_error(&mut self, message: &str) -> Result<Value, Error> {
        let id = self.alloc_obj(ObjCell::new(ObjKind::Error, Value::NULL))?;
        let obj = Value::object(id);
        self.gc_temp_roots.push(obj);
        let result = (|| {
            let msg = self.create_string(message)?;
            self.set_prop(obj, "message", msg)?;
            let trace = self.render_stack_trace();
            let trace_val = self.create_string(&trace)?;
            self.set_prop_attrs(obj, "stack", trace_val, attr::DONT_ENUM)?;
            Ok(obj)
        })();
        self.gc_temp_roots.pop();
        result
    }

    pub fn create_regexp(&mut self, pattern: &str) -> Result<Value, Error> {
        let re = regex::Regex::new(pattern)
            .map_err(|_| Error::invalid_arg(messages::BAD_REGEXP))?;
        let id = self.alloc_obj(ObjCell::new(ObjKind::Regexp(Box::new(re)), Value::NULL))?;
        let obj = Value::object(id);
        self.gc_temp_roots.push(obj);
        let source = self.create_string(pattern);
        self.gc_temp_roots.pop();
        self.set_prop_attrs(obj, "source", source?, attr::READ_ONLY | attr::DONT_ENUM)?;
        Ok(obj)
    }

    pub fn create_string(&mut self, s: &str) -> Result<Value, Error> {
        let key = Str::from_str(s);
        if let Some(&id) = self.interns.get(&key) {
            if self.heap.strings.contains(id) {
                return Ok(Value::string(id));
            }
        }
        let id = self.heap.alloc_string(key.clone());
        self.interns.insert(key, id);
        Ok(Value::string(id))
    }

    /// Register a host function and wrap it as a callable value.
    pub fn create_function(&mut self, f: NativeFn) -> Result<Value, Error> {
        let index = self.natives.len() as u32;
        self.natives.push(f);
        let id = self.alloc_func(FuncCell::native(index))?;
        Ok(Value::function(id))
    }

    /// A bare native-callback value with no function cell behind it; it
    /// carries only the table index and cannot hold properties.
    pub fn create_cfunction(&mut self, f: NativeFn) -> Value {
        let index = self.natives.len() as u32;
        self.natives.push(f);
        Value::cfunction(index)
    }

    pub fn create_foreign(&mut self, ptr: *mut ()) -> Value {
        Value::foreign(ptr)
    }

    // ---- string access -----------------------------------------------------

    pub fn get_string(&self, v: Value) -> Result<&str, Error> {
        if !v.is_string() {
            return Err(Error::invalid_arg(messages::NOT_A_STRING));
        }
        Ok(self.heap.str(v.as_string()).as_str())
    }

    // ---- ownership registry ------------------------------------------------

    /// Register `v` as a GC root visible to the embedder. Duplicates stack.
    pub fn own(&mut self, v: Value) -> Root {
        self.owned.own(v)
    }

    /// Remove the most recent registration of `root`. Returns false when
    /// the root was never owned or was already disowned.
    pub fn disown(&mut self, root: &Root) -> bool {
        self.owned.disown(root)
    }

    // ---- execution ---------------------------------------------------------

    /// Compile and run `src` with the global object as the receiver.
    pub fn exec(&mut self, src: &str) -> Result<Value, Error> {
        let this = self.global;
        self.exec_with(src, this)
    }

    /// Compile and run `src` with an explicit receiver.
    pub fn exec_with(&mut self, src: &str, this: Value) -> Result<Value, Error> {
        let unit = self.compile(src)?;
        self.exec_unit(&unit, this)
    }

    pub fn exec_file(&mut self, path: &Path) -> Result<Value, Error> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| Error::syntax(0, 0, format!("cannot read {}: {e}", path.display())))?;
        self.exec(&src)
    }

    /// Compile without executing; records `last_parse_error` on failure.
    pub fn compile(&mut self, src: &str) -> Result<Rc<Unit>, Error> {
        match mote_ir::compile(src, &self.limits) {
            Ok(unit) => {
                self.last_parse_error = None;
                Ok(Rc::new(unit))
            }
            Err(CompileError::Syntax(err)) => {
                self.last_parse_error = Some(err.clone());
                Err(Error::Syntax(err))
            }
            Err(CompileError::TooLarge { nodes, limit }) => {
                Err(Error::UnitTooLarge { nodes, limit })
            }
        }
    }

    // ---- interrupt ---------------------------------------------------------

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(Arc::clone(&self.interrupt))
    }

    /// Request cancellation from this thread.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }

    // ---- heap statistics ---------------------------------------------------

    pub fn heap_stat(&self, what: HeapStat) -> usize {
        match what {
            HeapStat::HeapUsed => self.heap.used_bytes(),
            HeapStat::HeapTotal => self.heap.reserved_bytes(),
            HeapStat::StringUsed => self.heap.strings.used_bytes(),
            HeapStat::StringTotal => self.heap.strings.reserved_bytes(),
            HeapStat::ObjectCells => self.heap.objects.live_count(),
            HeapStat::ObjectCapacity => self.heap.objects.cell_count(),
            HeapStat::ObjectCellSize => std::mem::size_of::<ObjCell>(),
            HeapStat::FunctionCells => self.heap.functions.live_count(),
            HeapStat::FunctionCapacity => self.heap.functions.cell_count(),
            HeapStat::FunctionCellSize => std::mem::size_of::<FuncCell>(),
            HeapStat::PropertyCells => self.heap.properties.live_count(),
            HeapStat::PropertyCapacity => self.heap.properties.cell_count(),
            HeapStat::PropertyCellSize => std::mem::size_of::<crate::core::object::PropRec>(),
        }
    }

    pub fn owned_count(&self) -> usize {
        self.owned.len()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
