//! Recursive-descent parser producing a `Unit`.
//!
//! Enforces a structural node budget while parsing: a source text whose AST
//! would exceed `Limits::max_nodes` is rejected before any unit is built.

use std::fmt;
use std::rc::Rc;

use crate::ast::{BinaryOp, Expr, FuncBody, IfStmt, Stmt, TryStmt, UnaryOp, Unit, WhileStmt};
use crate::lexer::{Lexer, Token, TokenKind};

/// A rejected source text. Carries the position of the first offending token.
#[derive(Clone, Debug)]
pub struct SyntaxError {
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

#[derive(Clone, Debug)]
pub enum CompileError {
    Syntax(SyntaxError),
    /// The unit's structural size exceeded `Limits::max_nodes`.
    TooLarge { nodes: usize, limit: usize },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Syntax(e) => write!(f, "syntax error: {e}"),
            CompileError::TooLarge { nodes, limit } => {
                write!(f, "compiled unit too large: {nodes} nodes (limit {limit})")
            }
        }
    }
}

impl From<SyntaxError> for CompileError {
    fn from(e: SyntaxError) -> Self {
        CompileError::Syntax(e)
    }
}

/// Parser recursion ceiling. Crafted nesting (`((((...))))`, `!!!!...x`,
/// `{{{{...}}}}`) must not exhaust the native call stack.
const MAX_NESTING: usize = 200;

/// Structural limits applied while building a unit.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub max_nodes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_nodes: 64 * 1024,
        }
    }
}

/// Compile `src` into a unit. On failure nothing is produced and no state is
/// touched; the error describes the first offending token.
pub fn compile(src: &str, limits: &Limits) -> Result<Unit, CompileError> {
    let tokens = Lexer::new(src).lex()?;
    let mut p = Parser {
        tokens,
        pos: 0,
        nodes: 0,
        limit: limits.max_nodes,
        depth: 0,
    };
    let mut body = Vec::new();
    while !p.at(&TokenKind::Eof) {
        body.push(p.parse_stmt()?);
    }
    Ok(Unit {
        body: body.into_boxed_slice(),
        node_count: p.nodes,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nodes: usize,
    limit: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, CompileError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    fn error_here(&self, message: String) -> CompileError {
        let t = self.peek();
        CompileError::Syntax(SyntaxError {
            line: t.line,
            col: t.col,
            message,
        })
    }

    fn enter(&mut self) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_here("nesting too deep".into()));
        }
        Ok(())
    }

    /// Account for one AST node against the budget.
    fn node(&mut self) -> Result<(), CompileError> {
        self.nodes += 1;
        if self.nodes > self.limit {
            return Err(CompileError::TooLarge {
                nodes: self.nodes,
                limit: self.limit,
            });
        }
        Ok(())
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.error_here(format!("expected {what}"))),
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        self.enter()?;
        let stmt = self.parse_stmt_inner();
        self.depth -= 1;
        stmt
    }

    fn parse_stmt_inner(&mut self) -> Result<Stmt, CompileError> {
        self.node()?;
        match self.peek().kind {
            TokenKind::Var => {
                self.bump();
                let name = self.expect_ident("variable name")?;
                let init = if self.eat(&TokenKind::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect(&TokenKind::Semi, "`;` after declaration")?;
                Ok(Stmt::Var(name, init))
            }
            TokenKind::If => {
                self.bump();
                self.expect(&TokenKind::LParen, "`(` after `if`")?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)` after condition")?;
                let then = self.parse_body()?;
                let otherwise = if self.eat(&TokenKind::Else) {
                    Some(self.parse_body()?)
                } else {
                    None
                };
                Ok(Stmt::If(Box::new(IfStmt {
                    cond,
                    then,
                    otherwise,
                })))
            }
            TokenKind::While => {
                self.bump();
                self.expect(&TokenKind::LParen, "`(` after `while`")?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)` after condition")?;
                let body = self.parse_body()?;
                Ok(Stmt::While(Box::new(WhileStmt { cond, body })))
            }
            TokenKind::Return => {
                self.bump();
                let value = if self.at(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semi, "`;` after return")?;
                Ok(Stmt::Return(value))
            }
            TokenKind::Throw => {
                self.bump();
                let value = self.parse_expr()?;
                self.expect(&TokenKind::Semi, "`;` after throw")?;
                Ok(Stmt::Throw(value))
            }
            TokenKind::Try => {
                self.bump();
                let body = self.parse_block()?;
                let catch = if self.eat(&TokenKind::Catch) {
                    self.expect(&TokenKind::LParen, "`(` after `catch`")?;
                    let name = self.expect_ident("catch binding")?;
                    self.expect(&TokenKind::RParen, "`)` after catch binding")?;
                    Some((name, self.parse_block()?))
                } else {
                    None
                };
                let finally = if self.eat(&TokenKind::Finally) {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                if catch.is_none() && finally.is_none() {
                    return Err(self.error_here("expected `catch` or `finally`".into()));
                }
                Ok(Stmt::Try(Box::new(TryStmt {
                    body,
                    catch,
                    finally,
                })))
            }
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Function => {
                // A named function at statement level declares a variable.
                let expr = self.parse_primary()?;
                if let Expr::Func(f) = &expr {
                    if let Some(name) = f.name.clone() {
                        return Ok(Stmt::Var(name, Some(expr)));
                    }
                }
                self.expect_stmt_end()?;
                Ok(Stmt::Expr(expr))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect_stmt_end()?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// Expression statements end with `;`. End of input also terminates the
    /// final one, so a unit can yield its last expression as its result.
    fn expect_stmt_end(&mut self) -> Result<(), CompileError> {
        if self.eat(&TokenKind::Semi) || self.at(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error_here("expected `;` after expression".into()))
        }
    }

    /// A brace-delimited statement list.
    fn parse_block(&mut self) -> Result<Box<[Stmt]>, CompileError> {
        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut out = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.at(&TokenKind::Eof) {
                return Err(self.error_here("unterminated block".into()));
            }
            out.push(self.parse_stmt()?);
        }
        self.bump();
        Ok(out.into_boxed_slice())
    }

    /// Either a block or a single statement (`if (x) y();`).
    fn parse_body(&mut self) -> Result<Box<[Stmt]>, CompileError> {
        if self.at(&TokenKind::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_stmt()?].into_boxed_slice())
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        self.enter()?;
        let expr = self.parse_assign();
        self.depth -= 1;
        expr
    }

    fn parse_assign(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.parse_or()?;
        if self.at(&TokenKind::Assign) {
            if !matches!(lhs, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..)) {
                return Err(self.error_here("invalid assignment target".into()));
            }
            self.bump();
            self.node()?;
            let rhs = self.parse_expr()?;
            return Ok(Expr::Assign(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) {
            self.node()?;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::AndAnd) {
            self.node()?;
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            self.bump();
            self.node()?;
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.bump();
            self.node()?;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            self.node()?;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.bump();
            self.node()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek().kind {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            self.node()?;
            self.enter()?;
            let operand = self.parse_unary();
            self.depth -= 1;
            return Ok(Expr::Unary(op, Box::new(operand?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.bump();
                    self.node()?;
                    let name = self.expect_ident("property name after `.`")?;
                    expr = Expr::Member(Box::new(expr), name);
                }
                TokenKind::LBracket => {
                    self.bump();
                    self.node()?;
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "`]`")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                TokenKind::LParen => {
                    self.bump();
                    self.node()?;
                    let mut args = Vec::new();
                    if !self.at(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "`)` after arguments")?;
                    expr = Expr::Call(Box::new(expr), args.into_boxed_slice());
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        self.node()?;
        let kind = self.peek().kind.clone();
        match kind {
            TokenKind::Number(n) => {
                self.bump();
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.bump();
                Ok(Expr::Str(s))
            }
            TokenKind::True => {
                self.bump();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.bump();
                Ok(Expr::Bool(false))
            }
            TokenKind::Null => {
                self.bump();
                Ok(Expr::Null)
            }
            TokenKind::Undefined => {
                self.bump();
                Ok(Expr::Undefined)
            }
            TokenKind::This => {
                self.bump();
                Ok(Expr::This)
            }
            TokenKind::Ident(name) => {
                self.bump();
                Ok(Expr::Ident(name))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.bump();
                let mut items = Vec::new();
                if !self.at(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket, "`]`")?;
                Ok(Expr::Array(items.into_boxed_slice()))
            }
            TokenKind::LBrace => {
                self.bump();
                let mut props = Vec::new();
                if !self.at(&TokenKind::RBrace) {
                    loop {
                        let key = match self.peek().kind.clone() {
                            TokenKind::Ident(name) => {
                                self.bump();
                                name
                            }
                            TokenKind::Str(s) => {
                                self.bump();
                                s
                            }
                            _ => return Err(self.error_here("expected property key".into())),
                        };
                        self.expect(&TokenKind::Colon, "`:` after property key")?;
                        props.push((key, self.parse_expr()?));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBrace, "`}`")?;
                Ok(Expr::Object(props.into_boxed_slice()))
            }
            TokenKind::Function => {
                self.bump();
                let name = match self.peek().kind.clone() {
                    TokenKind::Ident(n) => {
                        self.bump();
                        Some(n)
                    }
                    _ => None,
                };
                self.expect(&TokenKind::LParen, "`(` after `function`")?;
                let mut params = Vec::new();
                if !self.at(&TokenKind::RParen) {
                    loop {
                        params.push(self.expect_ident("parameter name")?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "`)` after parameters")?;
                let body = self.parse_block()?;
                Ok(Expr::Func(Rc::new(FuncBody {
                    name,
                    params: params.into_boxed_slice(),
                    body,
                })))
            }
            _ => Err(self.error_here("expected expression".into())),
        }
    }
}
