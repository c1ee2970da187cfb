//! Human-readable textual form of a compiled unit.

use std::fmt::Write;

use crate::ast::{Expr, Stmt, Unit};

impl Unit {
    /// Render the unit as an indented node tree.
    pub fn dump_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "unit nodes={}", self.node_count);
        for s in &self.body {
            dump_stmt(&mut out, s, 1);
        }
        out
    }
}

fn pad(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn dump_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    pad(out, depth);
    match stmt {
        Stmt::Var(name, init) => {
            let _ = writeln!(out, "var {name}");
            if let Some(e) = init {
                dump_expr(out, e, depth + 1);
            }
        }
        Stmt::If(s) => {
            out.push_str("if\n");
            dump_expr(out, &s.cond, depth + 1);
            pad(out, depth);
            out.push_str("then\n");
            for st in &s.then {
                dump_stmt(out, st, depth + 1);
            }
            if let Some(body) = &s.otherwise {
                pad(out, depth);
                out.push_str("else\n");
                for st in body {
                    dump_stmt(out, st, depth + 1);
                }
            }
        }
        Stmt::While(s) => {
            out.push_str("while\n");
            dump_expr(out, &s.cond, depth + 1);
            for st in &s.body {
                dump_stmt(out, st, depth + 1);
            }
        }
        Stmt::Try(s) => {
            out.push_str("try\n");
            for st in &s.body {
                dump_stmt(out, st, depth + 1);
            }
            if let Some((name, body)) = &s.catch {
                pad(out, depth);
                let _ = writeln!(out, "catch {name}");
                for st in body {
                    dump_stmt(out, st, depth + 1);
                }
            }
            if let Some(body) = &s.finally {
                pad(out, depth);
                out.push_str("finally\n");
                for st in body {
                    dump_stmt(out, st, depth + 1);
                }
            }
        }
        Stmt::Return(value) => {
            out.push_str("return\n");
            if let Some(e) = value {
                dump_expr(out, e, depth + 1);
            }
        }
        Stmt::Throw(e) => {
            out.push_str("throw\n");
            dump_expr(out, e, depth + 1);
        }
        Stmt::Block(body) => {
            out.push_str("block\n");
            for st in body {
                dump_stmt(out, st, depth + 1);
            }
        }
        Stmt::Expr(e) => {
            out.push_str("expr\n");
            dump_expr(out, e, depth + 1);
        }
    }
}

fn dump_expr(out: &mut String, expr: &Expr, depth: usize) {
    pad(out, depth);
    match expr {
        Expr::Number(n) => {
            let _ = writeln!(out, "number {n}");
        }
        Expr::Str(s) => {
            let _ = writeln!(out, "string {s:?}");
        }
        Expr::Bool(b) => {
            let _ = writeln!(out, "bool {b}");
        }
        Expr::Null => out.push_str("null\n"),
        Expr::Undefined => out.push_str("undefined\n"),
        Expr::This => out.push_str("this\n"),
        Expr::Ident(name) => {
            let _ = writeln!(out, "ident {name}");
        }
        Expr::Array(items) => {
            let _ = writeln!(out, "array len={}", items.len());
            for e in items {
                dump_expr(out, e, depth + 1);
            }
        }
        Expr::Object(props) => {
            let _ = writeln!(out, "object len={}", props.len());
            for (key, e) in props {
                pad(out, depth + 1);
                let _ = writeln!(out, "prop {key}");
                dump_expr(out, e, depth + 2);
            }
        }
        Expr::Func(f) => {
            let name = f.name.as_deref().unwrap_or("<anon>");
            let _ = writeln!(out, "func {name} params={}", f.params.join(","));
            for st in &f.body {
                dump_stmt(out, st, depth + 1);
            }
        }
        Expr::Member(obj, name) => {
            let _ = writeln!(out, "member {name}");
            dump_expr(out, obj, depth + 1);
        }
        Expr::Index(obj, idx) => {
            out.push_str("index\n");
            dump_expr(out, obj, depth + 1);
            dump_expr(out, idx, depth + 1);
        }
        Expr::Call(callee, args) => {
            let _ = writeln!(out, "call argc={}", args.len());
            dump_expr(out, callee, depth + 1);
            for e in args {
                dump_expr(out, e, depth + 1);
            }
        }
        Expr::Assign(target, value) => {
            out.push_str("assign\n");
            dump_expr(out, target, depth + 1);
            dump_expr(out, value, depth + 1);
        }
        Expr::Binary(op, a, b) => {
            let _ = writeln!(out, "binary {op:?}");
            dump_expr(out, a, depth + 1);
            dump_expr(out, b, depth + 1);
        }
        Expr::Unary(op, e) => {
            let _ = writeln!(out, "unary {op:?}");
            dump_expr(out, e, depth + 1);
        }
    }
}
