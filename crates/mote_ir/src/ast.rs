//! Owned AST types. A `Unit` is the compiled form the runtime executes.

use std::rc::Rc;

/// A compiled unit: the executable form of one source text.
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    pub body: Box<[Stmt]>,
    /// Total AST node count, counted at parse time against `Limits`.
    pub node_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Var(String, Option<Expr>),
    If(Box<IfStmt>),
    While(Box<WhileStmt>),
    Try(Box<TryStmt>),
    Return(Option<Expr>),
    Throw(Expr),
    Block(Box<[Stmt]>),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then: Box<[Stmt]>,
    pub otherwise: Option<Box<[Stmt]>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Box<[Stmt]>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TryStmt {
    pub body: Box<[Stmt]>,
    /// Catch clause: bound variable name and handler body.
    pub catch: Option<(String, Box<[Stmt]>)>,
    pub finally: Option<Box<[Stmt]>>,
}

/// A function literal body. Shared via `Rc` so closures created repeatedly
/// from the same literal do not copy the statement tree.
#[derive(Clone, Debug, PartialEq)]
pub struct FuncBody {
    pub name: Option<String>,
    pub params: Box<[String]>,
    pub body: Box<[Stmt]>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    This,
    Ident(String),
    Array(Box<[Expr]>),
    Object(Box<[(String, Expr)]>),
    Func(Rc<FuncBody>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Box<[Expr]>),
    Assign(Box<Expr>, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}
