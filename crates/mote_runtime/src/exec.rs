//! The tree-walking interpreter and the call protocol.
//!
//! Scopes are ordinary objects chained through their prototype slot, so the
//! collector traces captured environments with no extra machinery. Thrown
//! script values travel as `Error::Exception`; an interrupt surfaces the
//! same way, as a thrown Error object with message "Interrupted", so a
//! handler can observe cancellation. Stack overflow and out-of-memory
//! conditions use their own variants and cannot be caught by script `try`.

use std::sync::atomic::Ordering;

use smallvec::SmallVec;

use mote_ir::{BinaryOp, Expr, Stmt, UnaryOp, Unit};

use crate::core::object::{FuncCell, FuncKind, ObjCell, ObjKind};
use crate::core::strings::Str;
use crate::core::value::Value;
use crate::errors::{messages, Error};
use crate::frames::Frame;
use crate::runtime::Runtime;

/// Expression nesting ceiling across the active call chain. Operator chains
/// deeper than this would exhaust the native stack before finishing.
const MAX_EVAL_DEPTH: usize = 2048;

/// Non-error control flow out of a statement.
pub(crate) enum Flow {
    Normal,
    Return(Value),
}

impl Runtime {
    /// Run a compiled unit with `this` as the receiver. Top-level code
    /// executes in the global scope.
    pub fn exec_unit(&mut self, unit: &Unit, this: Value) -> Result<Value, Error> {
        let scope = self.global;
        self.push_frame(Frame {
            func: Value::UNDEFINED,
            this,
            scope,
            args: SmallVec::new(),
            name: None,
        })?;
        // The unit's result is its last expression-statement value; park it
        // in a root slot so collections between statements keep it alive.
        self.gc_temp_roots.push(Value::UNDEFINED);
        let slot = self.gc_temp_roots.len() - 1;
        let result = (|| {
            for stmt in unit.body.iter() {
                match stmt {
                    Stmt::Expr(e) => {
                        self.check_interrupt()?;
                        self.maybe_gc();
                        let v = self.eval(e, scope)?;
                        self.gc_temp_roots[slot] = v;
                    }
                    _ => match self.exec_stmt(stmt, scope)? {
                        Flow::Normal => {}
                        Flow::Return(v) => return Ok(v),
                    },
                }
            }
            Ok(self.gc_temp_roots[slot])
        })();
        self.gc_temp_roots.truncate(slot);
        self.pop_frame();
        result
    }

    /// Call a function value with an explicit receiver.
    pub fn apply(&mut self, func: Value, this: Value, args: &[Value]) -> Result<Value, Error> {
        if func.is_cfunction() {
            let index = func.as_cfunction();
            return self.call_native(index, func, this, args, None);
        }
        if !func.is_function() {
            let msg = format!("{} is not a function", func.type_name());
            return Err(self.throw_msg(&msg));
        }
        let cell = self.heap.func(func.as_function());
        match &cell.kind {
            FuncKind::Native(index) => {
                let index = *index;
                self.call_native(index, func, this, args, None)
            }
            FuncKind::Script { body, scope } => {
                let body = body.clone();
                let closure_scope = *scope;

                // Root the call inputs: they may reach here unprotected when
                // the embedder calls `apply` directly.
                let rooted = self.gc_temp_roots.len();
                self.gc_temp_roots.push(func);
                self.gc_temp_roots.push(this);
                self.gc_temp_roots.extend_from_slice(args);

                // A fresh scope object chained to the closure environment.
                let scope_id = match self.alloc_obj(ObjCell::new(ObjKind::Plain, closure_scope)) {
                    Ok(id) => id,
                    Err(e) => {
                        self.gc_temp_roots.truncate(rooted);
                        return Err(e);
                    }
                };
                let call_scope = Value::object(scope_id);

                let mut frame_args: SmallVec<[Value; 8]> = SmallVec::new();
                frame_args.extend_from_slice(args);
                let pushed = self.push_frame(Frame {
                    func,
                    this,
                    scope: call_scope,
                    args: frame_args,
                    name: body.name.clone(),
                });
                self.gc_temp_roots.truncate(rooted);
                pushed?;

                let result = (|| {
                    for (i, param) in body.params.iter().enumerate() {
                        let v = args.get(i).copied().unwrap_or(Value::UNDEFINED);
                        self.set_prop(call_scope, param, v)?;
                    }
                    for stmt in body.body.iter() {
                        match self.exec_stmt(stmt, call_scope)? {
                            Flow::Normal => {}
                            Flow::Return(v) => return Ok(v),
                        }
                    }
                    Ok(Value::UNDEFINED)
                })();
                self.pop_frame();
                result
            }
        }
    }

    fn call_native(
        &mut self,
        index: u32,
        func: Value,
        this: Value,
        args: &[Value],
        name: Option<String>,
    ) -> Result<Value, Error> {
        let Some(f) = self.natives.get(index as usize).copied() else {
            return Err(self.throw_msg(messages::NOT_A_FUNCTION));
        };
        let mut frame_args: SmallVec<[Value; 8]> = SmallVec::new();
        frame_args.extend_from_slice(args);
        self.push_frame(Frame {
            func,
            this,
            scope: Value::UNDEFINED,
            args: frame_args,
            name,
        })?;
        let result = f(self, this, args);
        self.pop_frame();
        result
    }

    /// Wrap a message in a freshly built Error object and return it as a
    /// thrown exception.
    pub fn throw_msg(&mut self, message: &str) -> Error {
        match self.create_error(message) {
            Ok(v) => Error::Exception(v),
            Err(e) => e,
        }
    }

    pub fn throw_value(&mut self, value: Value) -> Error {
        Error::Exception(value)
    }

    // ---- statements --------------------------------------------------------

    fn exec_stmt(&mut self, stmt: &Stmt, scope: Value) -> Result<Flow, Error> {
        self.check_interrupt()?;
        self.maybe_gc();
        match stmt {
            Stmt::Var(name, init) => {
                let v = match init {
                    Some(e) => self.eval(e, scope)?,
                    None => Value::UNDEFINED,
                };
                self.set_prop(scope, name, v)?;
                Ok(Flow::Normal)
            }
            Stmt::If(s) => {
                let cond = self.eval(&s.cond, scope)?;
                if self.truthy(cond) {
                    self.exec_block(&s.then, scope)
                } else if let Some(otherwise) = &s.otherwise {
                    self.exec_block(otherwise, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While(s) => {
                loop {
                    // An empty body executes no statements, so the loop
                    // itself must hit a cancellation check point.
                    self.check_interrupt()?;
                    let cond = self.eval(&s.cond, scope)?;
                    if !self.truthy(cond) {
                        break;
                    }
                    match self.exec_block(&s.body, scope)? {
                        Flow::Normal => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Try(s) => self.exec_try(s, scope),
            Stmt::Return(e) => {
                let v = match e {
                    Some(e) => self.eval(e, scope)?,
                    None => Value::UNDEFINED,
                };
                Ok(Flow::Return(v))
            }
            Stmt::Throw(e) => {
                let v = self.eval(e, scope)?;
                Err(Error::Exception(v))
            }
            Stmt::Block(body) => self.exec_block(body, scope),
            Stmt::Expr(e) => {
                self.eval(e, scope)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_block(&mut self, body: &[Stmt], scope: Value) -> Result<Flow, Error> {
        for stmt in body {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(&mut self, s: &mote_ir::TryStmt, scope: Value) -> Result<Flow, Error> {
        let mut outcome = self.exec_block(&s.body, scope);

        if let (Err(Error::Exception(exc)), Some((name, handler))) = (&outcome, &s.catch) {
            let exc = *exc;
            // Root the exception while the handler scope is built.
            self.gc_temp_roots.push(exc);
            let bound = self
                .alloc_obj(ObjCell::new(ObjKind::Plain, scope))
                .map(Value::object)
                .and_then(|catch_scope| {
                    self.set_prop(catch_scope, name, exc)?;
                    Ok(catch_scope)
                });
            self.gc_temp_roots.pop();
            outcome = match bound {
                Ok(catch_scope) => {
                    // The handler scope is reachable from no frame; keep it
                    // rooted while the handler runs.
                    self.gc_temp_roots.push(catch_scope);
                    let handled = self.exec_block(handler, catch_scope);
                    self.gc_temp_roots.pop();
                    handled
                }
                Err(e) => Err(e),
            };
        }

        if let Some(finally) = &s.finally {
            // Keep a pending thrown or returned value alive through the
            // finalizer; neither is reachable from any frame while it runs.
            let rooted = match &outcome {
                Err(Error::Exception(exc)) => {
                    self.gc_temp_roots.push(*exc);
                    true
                }
                Ok(Flow::Return(v)) => {
                    self.gc_temp_roots.push(*v);
                    true
                }
                _ => false,
            };
            let fin = self.exec_block(finally, scope);
            if rooted {
                self.gc_temp_roots.pop();
            }
            // A finalizer that returns or throws overrides the earlier
            // outcome.
            match fin {
                Ok(Flow::Normal) => {}
                other => return other,
            }
        }
        outcome
    }

    fn check_interrupt(&mut self) -> Result<(), Error> {
        self.interrupt_budget -= 1;
        if self.interrupt_budget == 0 {
            self.interrupt_budget = self.opts.interrupt_interval.max(1);
            if self.interrupt.swap(false, Ordering::SeqCst) {
                return Err(self.throw_msg("Interrupted"));
            }
        }
        Ok(())
    }

    // ---- expressions -------------------------------------------------------

    fn eval(&mut self, expr: &Expr, scope: Value) -> Result<Value, Error> {
        if self.eval_depth >= MAX_EVAL_DEPTH {
            return Err(Error::StackOverflow);
        }
        self.eval_depth += 1;
        let result = self.eval_inner(expr, scope);
        self.eval_depth -= 1;
        result
    }

    fn eval_inner(&mut self, expr: &Expr, scope: Value) -> Result<Value, Error> {
        match expr {
            Expr::Number(n) => Ok(Value::number(*n)),
            Expr::Str(s) => self.create_string(s),
            Expr::Bool(b) => Ok(Value::boolean(*b)),
            Expr::Null => Ok(Value::NULL),
            Expr::Undefined => Ok(Value::UNDEFINED),
            Expr::This => Ok(self
                .frames
                .last()
                .map(|f| f.this)
                .unwrap_or(self.global)),
            Expr::Ident(name) => self.lookup(name, scope),
            Expr::Array(items) => self.eval_array(items, scope),
            Expr::Object(fields) => self.eval_object(fields, scope),
            Expr::Func(body) => {
                let cell = FuncCell::script(body.clone(), scope);
                let id = self.alloc_func(cell)?;
                Ok(Value::function(id))
            }
            Expr::Member(obj, name) => {
                let target = self.eval(obj, scope)?;
                self.read_member(target, name)
            }
            Expr::Index(obj, key) => {
                let target = self.eval(obj, scope)?;
                self.gc_temp_roots.push(target);
                let key = self.eval(key, scope);
                self.gc_temp_roots.pop();
                let key = self.key_string(key?)?;
                self.read_member(target, &key)
            }
            Expr::Call(callee, args) => self.eval_call(callee, args, scope),
            Expr::Assign(place, rhs) => self.eval_assign(place, rhs, scope),
            Expr::Binary(op, l, r) => self.eval_binary(*op, l, r, scope),
            Expr::Unary(op, e) => {
                let v = self.eval(e, scope)?;
                match op {
                    UnaryOp::Not => Ok(Value::boolean(!self.truthy(v))),
                    UnaryOp::Neg => match v.try_number() {
                        Ok(n) => Ok(Value::number(-n)),
                        Err(_) => {
                            let msg = format!("cannot negate a {}", v.type_name());
                            Err(self.throw_msg(&msg))
                        }
                    },
                }
            }
        }
    }

    /// Scope-chain lookup. Unresolved names throw.
    fn lookup(&mut self, name: &str, scope: Value) -> Result<Value, Error> {
        let mut holder = scope;
        loop {
            if self.find_own(holder, name)?.is_some() {
                return self.get_prop(holder, name);
            }
            let proto = self.heap.obj(holder.as_object()).proto;
            if !proto.is_object() {
                let msg = format!("{name} is not defined");
                return Err(self.throw_msg(&msg));
            }
            holder = proto;
        }
    }

    fn eval_array(&mut self, items: &[Expr], scope: Value) -> Result<Value, Error> {
        let arr = self.create_array()?;
        self.gc_temp_roots.push(arr);
        let result = (|| {
            for (i, item) in items.iter().enumerate() {
                let v = self.eval(item, scope)?;
                self.array_set(arr, i as u32, v)?;
            }
            Ok(arr)
        })();
        self.gc_temp_roots.pop();
        result
    }

    fn eval_object(&mut self, fields: &[(String, Expr)], scope: Value) -> Result<Value, Error> {
        let obj = self.create_object()?;
        self.gc_temp_roots.push(obj);
        let result = (|| {
            for (name, init) in fields {
                let v = self.eval(init, scope)?;
                self.set_prop(obj, name, v)?;
            }
            Ok(obj)
        })();
        self.gc_temp_roots.pop();
        result
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        scope: Value,
    ) -> Result<Value, Error> {
        // Method calls bind the receiver; plain calls get the global.
        let (func, this) = match callee {
            Expr::Member(obj, name) => {
                let target = self.eval(obj, scope)?;
                self.gc_temp_roots.push(target);
                let func = self.read_member(target, name);
                self.gc_temp_roots.pop();
                (func?, target)
            }
            Expr::Index(obj, key) => {
                let target = self.eval(obj, scope)?;
                self.gc_temp_roots.push(target);
                let func = self
                    .eval(key, scope)
                    .and_then(|k| self.key_string(k))
                    .and_then(|k| self.read_member(target, &k));
                self.gc_temp_roots.pop();
                (func?, target)
            }
            other => (self.eval(other, scope)?, self.global),
        };

        self.gc_temp_roots.push(func);
        self.gc_temp_roots.push(this);
        let rooted_before = self.gc_temp_roots.len();
        let mut argv: SmallVec<[Value; 8]> = SmallVec::new();
        let evaluated = (|| {
            for arg in args {
                let v = self.eval(arg, scope)?;
                self.gc_temp_roots.push(v);
                argv.push(v);
            }
            Ok(())
        })();
        let result = match evaluated {
            Ok(()) => self.apply(func, this, &argv),
            Err(e) => Err(e),
        };
        self.gc_temp_roots.truncate(rooted_before);
        self.gc_temp_roots.pop();
        self.gc_temp_roots.pop();
        result
    }

    fn eval_assign(&mut self, place: &Expr, rhs: &Expr, scope: Value) -> Result<Value, Error> {
        match place {
            Expr::Ident(name) => {
                let v = self.eval(rhs, scope)?;
                // Assign where the name is bound; fall back to the global.
                let mut holder = scope;
                loop {
                    if self.find_own(holder, name)?.is_some() {
                        self.set_prop(holder, name, v)?;
                        return Ok(v);
                    }
                    let proto = self.heap.obj(holder.as_object()).proto;
                    if !proto.is_object() {
                        self.set_prop(self.global, name, v)?;
                        return Ok(v);
                    }
                    holder = proto;
                }
            }
            Expr::Member(obj, name) => {
                let target = self.eval(obj, scope)?;
                self.gc_temp_roots.push(target);
                let v = self.eval(rhs, scope);
                self.gc_temp_roots.pop();
                let v = v?;
                self.write_member(target, name, v)?;
                Ok(v)
            }
            Expr::Index(obj, key) => {
                let target = self.eval(obj, scope)?;
                self.gc_temp_roots.push(target);
                let outcome = self.eval(key, scope).and_then(|k| {
                    self.gc_temp_roots.push(k);
                    let v = self.eval(rhs, scope);
                    self.gc_temp_roots.pop();
                    let v = v?;
                    let key = self.key_string(k)?;
                    self.write_member(target, &key, v)?;
                    Ok(v)
                });
                self.gc_temp_roots.pop();
                outcome
            }
            _ => Err(self.throw_msg("invalid assignment target")),
        }
    }

    fn read_member(&mut self, target: Value, name: &str) -> Result<Value, Error> {
        if target.is_object() || target.is_function() {
            return self.get_prop(target, name);
        }
        if target.is_string() {
            // Strings expose only their length.
            if name == "length" {
                let len = self.heap.str(target.as_string()).as_str().chars().count();
                return Ok(Value::number(len as f64));
            }
            return Ok(Value::UNDEFINED);
        }
        let msg = format!("cannot read property '{}' of {}", name, target.type_name());
        Err(self.throw_msg(&msg))
    }

    fn write_member(&mut self, target: Value, name: &str, value: Value) -> Result<(), Error> {
        if target.is_object() || target.is_function() {
            return self.set_prop(target, name, value);
        }
        let msg = format!("cannot set property '{}' of {}", name, target.type_name());
        Err(self.throw_msg(&msg))
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        l: &Expr,
        r: &Expr,
        scope: Value,
    ) -> Result<Value, Error> {
        // Short-circuit forms evaluate the right side conditionally and
        // yield the deciding operand.
        match op {
            BinaryOp::And => {
                let lv = self.eval(l, scope)?;
                if !self.truthy(lv) {
                    return Ok(lv);
                }
                return self.eval(r, scope);
            }
            BinaryOp::Or => {
                let lv = self.eval(l, scope)?;
                if self.truthy(lv) {
                    return Ok(lv);
                }
                return self.eval(r, scope);
            }
            _ => {}
        }

        let lv = self.eval(l, scope)?;
        self.gc_temp_roots.push(lv);
        let rv = self.eval(r, scope);
        self.gc_temp_roots.pop();
        let rv = rv?;

        match op {
            BinaryOp::Add => {
                if lv.is_string() || rv.is_string() {
                    let mut out = Str::new();
                    self.display_value(&mut out, lv);
                    self.display_value(&mut out, rv);
                    let id = self.heap.alloc_string(out);
                    return Ok(Value::string(id));
                }
                self.arith(lv, rv, |a, b| a + b)
            }
            BinaryOp::Sub => self.arith(lv, rv, |a, b| a - b),
            BinaryOp::Mul => self.arith(lv, rv, |a, b| a * b),
            BinaryOp::Div => self.arith(lv, rv, |a, b| a / b),
            BinaryOp::Mod => self.arith(lv, rv, |a, b| a % b),
            BinaryOp::Eq => Ok(Value::boolean(self.loose_eq(lv, rv))),
            BinaryOp::Ne => Ok(Value::boolean(!self.loose_eq(lv, rv))),
            BinaryOp::Lt => self.compare(lv, rv, |o| o == std::cmp::Ordering::Less),
            BinaryOp::Gt => self.compare(lv, rv, |o| o == std::cmp::Ordering::Greater),
            BinaryOp::Le => self.compare(lv, rv, |o| o != std::cmp::Ordering::Greater),
            BinaryOp::Ge => self.compare(lv, rv, |o| o != std::cmp::Ordering::Less),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn arith(
        &mut self,
        lv: Value,
        rv: Value,
        f: impl FnOnce(f64, f64) -> f64,
    ) -> Result<Value, Error> {
        match (lv.try_number(), rv.try_number()) {
            (Ok(a), Ok(b)) => Ok(Value::number(f(a, b))),
            _ => {
                let msg = format!(
                    "cannot apply arithmetic to {} and {}",
                    lv.type_name(),
                    rv.type_name()
                );
                Err(self.throw_msg(&msg))
            }
        }
    }

    fn compare(
        &mut self,
        lv: Value,
        rv: Value,
        f: impl FnOnce(std::cmp::Ordering) -> bool,
    ) -> Result<Value, Error> {
        if lv.is_number() && rv.is_number() {
            let (a, b) = (lv.as_number(), rv.as_number());
            if a.is_nan() || b.is_nan() {
                return Ok(Value::FALSE);
            }
            let ord = a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal);
            return Ok(Value::boolean(f(ord)));
        }
        if lv.is_string() && rv.is_string() {
            let a = self.heap.str(lv.as_string()).as_str();
            let b = self.heap.str(rv.as_string()).as_str();
            return Ok(Value::boolean(f(a.cmp(b))));
        }
        let msg = format!(
            "cannot compare {} and {}",
            lv.type_name(),
            rv.type_name()
        );
        Err(self.throw_msg(&msg))
    }

    /// Equality: numbers by value, strings by content, everything else by
    /// identity. `null` and `undefined` are distinct.
    pub(crate) fn loose_eq(&self, a: Value, b: Value) -> bool {
        if a.is_number() && b.is_number() {
            return a.as_number() == b.as_number();
        }
        if a.is_string() && b.is_string() {
            return self.heap.str(a.as_string()) == self.heap.str(b.as_string());
        }
        a == b
    }

    pub(crate) fn truthy(&self, v: Value) -> bool {
        if v.is_boolean() {
            return v.as_boolean();
        }
        if v.is_number() {
            let n = v.as_number();
            return n != 0.0 && !n.is_nan();
        }
        if v.is_null() || v.is_undefined() {
            return false;
        }
        if v.is_string() {
            return !self.heap.str(v.as_string()).is_empty();
        }
        true
    }

    /// Stringify an index-expression key: numbers canonically, strings
    /// verbatim, the rest through display formatting.
    fn key_string(&mut self, key: Value) -> Result<String, Error> {
        if key.is_string() {
            return Ok(self.heap.str(key.as_string()).as_str().to_string());
        }
        let mut out = Str::new();
        self.display_value(&mut out, key);
        Ok(out.as_str().to_string())
    }

    /// Human-readable rendering used by string concatenation and `print`.
    pub fn display_value(&self, out: &mut Str, v: Value) {
        if v.is_number() {
            out.push_f64(v.as_number());
        } else if v.is_string() {
            out.push_str(self.heap.str(v.as_string()).as_str());
        } else if v.is_boolean() {
            out.push_str(if v.as_boolean() { "true" } else { "false" });
        } else if v.is_null() {
            out.push_str("null");
        } else if v.is_undefined() {
            out.push_str("undefined");
        } else if v.is_function() || v.is_cfunction() {
            out.push_str("[function]");
        } else if v.is_foreign() {
            out.push_str("[foreign]");
        } else if self.is_array(v) {
            out.push_str("[array]");
        } else {
            out.push_str("[object]");
        }
    }
}
