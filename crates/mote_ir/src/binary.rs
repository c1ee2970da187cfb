//! Binary encoding of compiled units.
//!
//! Format: `MOTU` magic, `u16` version, a string table, then the statement
//! stream with strings as table indices. The format is only meant to be read
//! back by the same runtime version; any version mismatch is rejected on
//! decode.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::ast::{BinaryOp, Expr, FuncBody, IfStmt, Stmt, TryStmt, UnaryOp, Unit, WhileStmt};
use crate::parser::Limits;

const MAGIC: &[u8; 4] = b"MOTU";
const VERSION: u16 = 1;

/// Decode recursion ceiling. Trees this deep fail to evaluate anyway, and a
/// crafted byte stream must not exhaust the call stack during decode.
const MAX_NESTING: usize = 2048;

#[derive(Clone, Debug)]
pub enum DecodeError {
    Malformed(String),
    Version { found: u16 },
    TooLarge { nodes: usize, limit: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(msg) => write!(f, "malformed unit: {msg}"),
            DecodeError::Version { found } => {
                write!(f, "unit version {found} does not match {VERSION}")
            }
            DecodeError::TooLarge { nodes, limit } => {
                write!(f, "unit too large: {nodes} nodes (limit {limit})")
            }
        }
    }
}

impl Unit {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut enc = Encoder {
            strings: IndexSet::new(),
            body: Vec::new(),
        };
        enc.body.extend((self.body.len() as u32).to_le_bytes());
        for s in &self.body {
            enc.stmt(s);
        }

        let mut out = Vec::with_capacity(enc.body.len() + 64);
        out.extend_from_slice(MAGIC);
        out.extend(VERSION.to_le_bytes());
        out.extend((enc.strings.len() as u32).to_le_bytes());
        for s in &enc.strings {
            out.extend((s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        out.extend_from_slice(&enc.body);
        out
    }

    pub fn from_bytes(bytes: &[u8], limits: &Limits) -> Result<Unit, DecodeError> {
        let mut dec = Decoder {
            bytes,
            pos: 0,
            strings: Vec::new(),
            nodes: 0,
            limit: limits.max_nodes,
            depth: 0,
        };
        let magic = dec.take(4)?;
        if magic != MAGIC {
            return Err(DecodeError::Malformed("bad magic".into()));
        }
        let version = dec.u16()?;
        if version != VERSION {
            return Err(DecodeError::Version { found: version });
        }
        let nstrings = dec.u32()? as usize;
        for _ in 0..nstrings {
            let len = dec.u32()? as usize;
            let raw = dec.take(len)?;
            let s = std::str::from_utf8(raw)
                .map_err(|_| DecodeError::Malformed("string table is not UTF-8".into()))?;
            dec.strings.push(s.to_string());
        }
        let body = dec.stmts()?;
        if dec.pos != dec.bytes.len() {
            return Err(DecodeError::Malformed("trailing bytes".into()));
        }
        Ok(Unit {
            body,
            node_count: dec.nodes,
        })
    }
}

struct Encoder {
    strings: IndexSet<String>,
    body: Vec<u8>,
}

impl Encoder {
    fn str_ref(&mut self, s: &str) {
        let idx = match self.strings.get_index_of(s) {
            Some(i) => i,
            None => self.strings.insert_full(s.to_string()).0,
        };
        self.body.extend((idx as u32).to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.body.extend(v.to_le_bytes());
    }

    fn stmts(&mut self, body: &[Stmt]) {
        self.u32(body.len() as u32);
        for s in body {
            self.stmt(s);
        }
    }

    fn opt_stmts(&mut self, body: &Option<Box<[Stmt]>>) {
        match body {
            Some(b) => {
                self.body.push(1);
                self.stmts(b);
            }
            None => self.body.push(0),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var(name, init) => {
                self.body.push(0);
                self.str_ref(name);
                match init {
                    Some(e) => {
                        self.body.push(1);
                        self.expr(e);
                    }
                    None => self.body.push(0),
                }
            }
            Stmt::If(s) => {
                self.body.push(1);
                self.expr(&s.cond);
                self.stmts(&s.then);
                self.opt_stmts(&s.otherwise);
            }
            Stmt::While(s) => {
                self.body.push(2);
                self.expr(&s.cond);
                self.stmts(&s.body);
            }
            Stmt::Try(s) => {
                self.body.push(3);
                self.stmts(&s.body);
                match &s.catch {
                    Some((name, body)) => {
                        self.body.push(1);
                        self.str_ref(name);
                        self.stmts(body);
                    }
                    None => self.body.push(0),
                }
                self.opt_stmts(&s.finally);
            }
            Stmt::Return(value) => {
                self.body.push(4);
                match value {
                    Some(e) => {
                        self.body.push(1);
                        self.expr(e);
                    }
                    None => self.body.push(0),
                }
            }
            Stmt::Throw(e) => {
                self.body.push(5);
                self.expr(e);
            }
            Stmt::Block(body) => {
                self.body.push(6);
                self.stmts(body);
            }
            Stmt::Expr(e) => {
                self.body.push(7);
                self.expr(e);
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number(n) => {
                self.body.push(0);
                self.body.extend(n.to_bits().to_le_bytes());
            }
            Expr::Str(s) => {
                self.body.push(1);
                self.str_ref(s);
            }
            Expr::Bool(b) => {
                self.body.push(2);
                self.body.push(*b as u8);
            }
            Expr::Null => self.body.push(3),
            Expr::Undefined => self.body.push(4),
            Expr::This => self.body.push(5),
            Expr::Ident(name) => {
                self.body.push(6);
                self.str_ref(name);
            }
            Expr::Array(items) => {
                self.body.push(7);
                self.u32(items.len() as u32);
                for e in items {
                    self.expr(e);
                }
            }
            Expr::Object(props) => {
                self.body.push(8);
                self.u32(props.len() as u32);
                for (key, e) in props {
                    self.str_ref(key);
                    self.expr(e);
                }
            }
            Expr::Func(f) => {
                self.body.push(9);
                match &f.name {
                    Some(n) => {
                        self.body.push(1);
                        self.str_ref(n);
                    }
                    None => self.body.push(0),
                }
                self.u32(f.params.len() as u32);
                for p in &f.params {
                    self.str_ref(p);
                }
                self.stmts(&f.body);
            }
            Expr::Member(obj, name) => {
                self.body.push(10);
                self.expr(obj);
                self.str_ref(name);
            }
            Expr::Index(obj, idx) => {
                self.body.push(11);
                self.expr(obj);
                self.expr(idx);
            }
            Expr::Call(callee, args) => {
                self.body.push(12);
                self.expr(callee);
                self.u32(args.len() as u32);
                for e in args {
                    self.expr(e);
                }
            }
            Expr::Assign(target, value) => {
                self.body.push(13);
                self.expr(target);
                self.expr(value);
            }
            Expr::Binary(op, a, b) => {
                self.body.push(14);
                self.body.push(*op as u8);
                self.expr(a);
                self.expr(b);
            }
            Expr::Unary(op, e) => {
                self.body.push(15);
                self.body.push(*op as u8);
                self.expr(e);
            }
        }
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    strings: Vec<String>,
    nodes: usize,
    limit: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.pos + n > self.bytes.len() {
            return Err(DecodeError::Malformed("unexpected end of input".into()));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f64(&mut self) -> Result<f64, DecodeError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(f64::from_bits(u64::from_le_bytes(raw)))
    }

    fn str_ref(&mut self) -> Result<String, DecodeError> {
        let idx = self.u32()? as usize;
        self.strings
            .get(idx)
            .cloned()
            .ok_or_else(|| DecodeError::Malformed(format!("string index {idx} out of range")))
    }

    fn node(&mut self) -> Result<(), DecodeError> {
        self.nodes += 1;
        if self.nodes > self.limit {
            return Err(DecodeError::TooLarge {
                nodes: self.nodes,
                limit: self.limit,
            });
        }
        Ok(())
    }

    fn enter(&mut self) -> Result<(), DecodeError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(DecodeError::Malformed("nesting too deep".into()));
        }
        Ok(())
    }

    fn stmts(&mut self) -> Result<Box<[Stmt]>, DecodeError> {
        let n = self.u32()? as usize;
        let mut out = Vec::with_capacity(n.min(1024));
        for _ in 0..n {
            out.push(self.stmt()?);
        }
        Ok(out.into_boxed_slice())
    }

    fn opt_stmts(&mut self) -> Result<Option<Box<[Stmt]>>, DecodeError> {
        Ok(if self.u8()? == 1 {
            Some(self.stmts()?)
        } else {
            None
        })
    }

    fn stmt(&mut self) -> Result<Stmt, DecodeError> {
        self.enter()?;
        let stmt = self.stmt_inner();
        self.depth -= 1;
        stmt
    }

    fn stmt_inner(&mut self) -> Result<Stmt, DecodeError> {
        self.node()?;
        match self.u8()? {
            0 => {
                let name = self.str_ref()?;
                let init = if self.u8()? == 1 {
                    Some(self.expr()?)
                } else {
                    None
                };
                Ok(Stmt::Var(name, init))
            }
            1 => Ok(Stmt::If(Box::new(IfStmt {
                cond: self.expr()?,
                then: self.stmts()?,
                otherwise: self.opt_stmts()?,
            }))),
            2 => Ok(Stmt::While(Box::new(WhileStmt {
                cond: self.expr()?,
                body: self.stmts()?,
            }))),
            3 => {
                let body = self.stmts()?;
                let catch = if self.u8()? == 1 {
                    let name = self.str_ref()?;
                    Some((name, self.stmts()?))
                } else {
                    None
                };
                let finally = self.opt_stmts()?;
                Ok(Stmt::Try(Box::new(TryStmt {
                    body,
                    catch,
                    finally,
                })))
            }
            4 => {
                let value = if self.u8()? == 1 {
                    Some(self.expr()?)
                } else {
                    None
                };
                Ok(Stmt::Return(value))
            }
            5 => Ok(Stmt::Throw(self.expr()?)),
            6 => Ok(Stmt::Block(self.stmts()?)),
            7 => Ok(Stmt::Expr(self.expr()?)),
            t => Err(DecodeError::Malformed(format!("unknown statement tag {t}"))),
        }
    }

    fn expr(&mut self) -> Result<Expr, DecodeError> {
        self.enter()?;
        let expr = self.expr_inner();
        self.depth -= 1;
        expr
    }

    fn expr_inner(&mut self) -> Result<Expr, DecodeError> {
        self.node()?;
        match self.u8()? {
            0 => Ok(Expr::Number(self.f64()?)),
            1 => Ok(Expr::Str(self.str_ref()?)),
            2 => Ok(Expr::Bool(self.u8()? != 0)),
            3 => Ok(Expr::Null),
            4 => Ok(Expr::Undefined),
            5 => Ok(Expr::This),
            6 => Ok(Expr::Ident(self.str_ref()?)),
            7 => {
                let n = self.u32()? as usize;
                let mut items = Vec::with_capacity(n.min(1024));
                for _ in 0..n {
                    items.push(self.expr()?);
                }
                Ok(Expr::Array(items.into_boxed_slice()))
            }
            8 => {
                let n = self.u32()? as usize;
                let mut props = Vec::with_capacity(n.min(1024));
                for _ in 0..n {
                    let key = self.str_ref()?;
                    props.push((key, self.expr()?));
                }
                Ok(Expr::Object(props.into_boxed_slice()))
            }
            9 => {
                let name = if self.u8()? == 1 {
                    Some(self.str_ref()?)
                } else {
                    None
                };
                let n = self.u32()? as usize;
                let mut params = Vec::with_capacity(n.min(256));
                for _ in 0..n {
                    params.push(self.str_ref()?);
                }
                let body = self.stmts()?;
                Ok(Expr::Func(Rc::new(FuncBody {
                    name,
                    params: params.into_boxed_slice(),
                    body,
                })))
            }
            10 => {
                let obj = self.expr()?;
                let name = self.str_ref()?;
                Ok(Expr::Member(Box::new(obj), name))
            }
            11 => {
                let obj = self.expr()?;
                let idx = self.expr()?;
                Ok(Expr::Index(Box::new(obj), Box::new(idx)))
            }
            12 => {
                let callee = self.expr()?;
                let n = self.u32()? as usize;
                let mut args = Vec::with_capacity(n.min(256));
                for _ in 0..n {
                    args.push(self.expr()?);
                }
                Ok(Expr::Call(Box::new(callee), args.into_boxed_slice()))
            }
            13 => {
                let target = self.expr()?;
                let value = self.expr()?;
                Ok(Expr::Assign(Box::new(target), Box::new(value)))
            }
            14 => {
                let op = binary_op(self.u8()?)?;
                let a = self.expr()?;
                let b = self.expr()?;
                Ok(Expr::Binary(op, Box::new(a), Box::new(b)))
            }
            15 => {
                let op = match self.u8()? {
                    0 => UnaryOp::Not,
                    1 => UnaryOp::Neg,
                    t => {
                        return Err(DecodeError::Malformed(format!("unknown unary op {t}")));
                    }
                };
                Ok(Expr::Unary(op, Box::new(self.expr()?)))
            }
            t => Err(DecodeError::Malformed(format!("unknown expression tag {t}"))),
        }
    }
}

fn binary_op(tag: u8) -> Result<BinaryOp, DecodeError> {
    Ok(match tag {
        0 => BinaryOp::Add,
        1 => BinaryOp::Sub,
        2 => BinaryOp::Mul,
        3 => BinaryOp::Div,
        4 => BinaryOp::Mod,
        5 => BinaryOp::Eq,
        6 => BinaryOp::Ne,
        7 => BinaryOp::Lt,
        8 => BinaryOp::Gt,
        9 => BinaryOp::Le,
        10 => BinaryOp::Ge,
        11 => BinaryOp::And,
        12 => BinaryOp::Or,
        _ => return Err(DecodeError::Malformed(format!("unknown binary op {tag}"))),
    })
}
