//! Lowered form of script code, with every name already resolved to the
//! scope it lives in.

use crate::runtime::function::{CodeObject, MethodKind};
use crate::runtime::value::Value;
use std::rc::Rc;

/// A resolved variable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Name {
    /// Bound in the running function.
    Local(String),
    /// Captured from an enclosing function through the closure.
    Free(String),
    /// Module namespace, then builtins.
    Global(String),
}

impl Name {
    pub fn ident(&self) -> &str {
        match self {
            Name::Local(name) | Name::Free(name) | Name::Global(name) => name,
        }
    }
}

#[derive(Debug, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
}

#[derive(Debug)]
pub enum Stmt {
    /// `let`; a `_` pattern has no target.
    Let {
        target: Option<Name>,
        init: Option<Expr>,
    },
    Expr(Expr),
    Item(Item),
}

#[derive(Debug)]
pub enum Item {
    Function(FunctionDef),
    Class {
        target: Name,
        name: String,
        qualname: String,
    },
    Impl {
        class: Name,
        methods: Vec<FunctionDef>,
    },
    Const {
        target: Name,
        value: Expr,
    },
}

/// Where a function's captured cell comes from when the definition runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// A variable of the function executing the definition.
    Frame(String),
    /// The class of the `impl` block being executed (`Self`).
    SelfType,
}

#[derive(Debug)]
pub struct FunctionDef {
    /// Variable receiving the function; `None` for methods and closures.
    pub target: Option<Name>,
    /// Member name inside an `impl` (mangled).
    pub member: String,
    pub qualname: String,
    pub kind: MethodKind,
    pub code: Rc<CodeObject>,
    /// One entry per `code.freevars`, same order.
    pub captures: Vec<Capture>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "subtract",
            BinOp::Mul => "multiply",
            BinOp::Div => "divide",
            BinOp::Rem => "take the remainder of",
            BinOp::Eq | BinOp::Ne => "compare",
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => "order",
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => "combine bits of",
            BinOp::Shl | BinOp::Shr => "shift",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    Int,
    Float,
}

#[derive(Debug)]
pub enum FormatPiece {
    Literal(String),
    Arg { expr: Expr, debug: bool },
}

#[derive(Debug)]
pub enum Place {
    Name(Name),
    Field { base: Box<Expr>, field: String },
    Index { base: Box<Expr>, index: Box<Expr> },
}

#[derive(Debug)]
pub enum Expr {
    Const(Value),
    Load(Name),
    Assign {
        target: Place,
        value: Box<Expr>,
    },
    AssignOp {
        target: Place,
        op: BinOp,
        value: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Field {
        base: Box<Expr>,
        field: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// `Type::member`
    Member {
        base: Box<Expr>,
        member: String,
    },
    StructLit {
        class: Box<Expr>,
        fields: Vec<(String, Expr)>,
    },
    List(Vec<Expr>),
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        inclusive: bool,
    },
    If {
        cond: Box<Expr>,
        then: Block,
        otherwise: Option<Box<Expr>>,
    },
    While {
        cond: Box<Expr>,
        body: Block,
    },
    Loop(Block),
    For {
        target: Option<Name>,
        iter: Box<Expr>,
        body: Block,
    },
    Block(Block),
    Break(Option<Box<Expr>>),
    Continue,
    Return(Option<Box<Expr>>),
    Closure(Box<FunctionDef>),
    Format(Vec<FormatPiece>),
    Print {
        pieces: Vec<FormatPiece>,
        newline: bool,
        stderr: bool,
    },
    Panic(Vec<FormatPiece>),
    Cast {
        expr: Box<Expr>,
        to: CastType,
    },
}
