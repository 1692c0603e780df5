use crate::frontend::lexer::Span;
use crate::lang::data_type::DataType;

/// Binary operators. Each one resolves to a builtin function of the same
/// symbol, except `=` which is an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Assign,
    Eq,
    Greater,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Assign => "=",
            BinaryOp::Eq => "==",
            BinaryOp::Greater => ">",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    /// Binding strength for precedence climbing; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Assign => 1,
            BinaryOp::Eq => 3,
            BinaryOp::Greater => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div => 6,
        }
    }
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // ───────────────────────────── Literals ─────────────────────────────
    /// Number or character literal, already reduced to a cell value.
    Number(u8),

    // ───────────────────────────── Names ────────────────────────────────
    /// Read of a variable.
    Variable(String),

    /// `name(args...)`: user function or builtin.
    Call { name: String, args: Vec<Expr> },

    // ───────────────────────────── Operators ────────────────────────────
    /// `lhs op rhs`.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: DataType,
    pub span: Span,
}

/// `func name(params): type body`
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: DataType,
    pub body: Box<Stmt>,
    pub span: Span,
}

/// Statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `{ stmts }`, opens a new scope.
    Block(Vec<Stmt>),

    /// `var name = value;`
    Var { name: String, value: Expr, span: Span },

    /// `expr;`
    Expr(Expr),

    /// `if (cond) then [else otherwise]`
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while (cond) body`
    While { cond: Expr, body: Box<Stmt> },

    /// `do body while (cond);`
    DoWhile { body: Box<Stmt>, cond: Expr },

    /// `return [value];`
    Return { value: Option<Expr>, span: Span },

    /// Function declaration; hoisted to the start of its block.
    Func(FuncDecl),
}

/// A parsed compilation unit: the statements of the main block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}
