//! The resolved tree: names replaced by scope-arena ids and every expression
//! annotated with its type. Produced by the resolver, consumed by the IR
//! compiler.

use crate::lang::data_type::DataType;
use crate::lang::scope::{FuncId, VarId};

#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedExprKind {
    Number(u8),
    Variable(VarId),
    Assign { var: VarId, value: Box<TypedExpr> },
    /// Call of a user function or a builtin; the function decides how it is
    /// emitted.
    Call { func: FuncId, args: Vec<TypedExpr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedStmt {
    Block(Vec<TypedStmt>),
    Var { var: VarId, value: TypedExpr },
    Expr(TypedExpr),
    If {
        cond: TypedExpr,
        then_branch: Box<TypedStmt>,
        else_branch: Option<Box<TypedStmt>>,
    },
    While { cond: TypedExpr, body: Box<TypedStmt> },
    DoWhile { body: Box<TypedStmt>, cond: TypedExpr },
    Return { value: Option<TypedExpr> },
}

/// A resolved user function.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedFunction {
    pub func: FuncId,
    pub params: Vec<VarId>,
    pub return_type: DataType,
    pub body: TypedStmt,
}

/// A resolved compilation unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedProgram {
    pub main: Vec<TypedStmt>,
    pub functions: Vec<TypedFunction>,
}
