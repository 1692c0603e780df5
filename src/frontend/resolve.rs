use thiserror::Error;
use tracing::debug;

use crate::frontend::lexer::Span;
use crate::lang::data_type::DataType;
use crate::lang::node::{BinaryOp, Expr, ExprKind, FuncDecl, Program, Stmt};
use crate::lang::scope::{FuncId, Function, GlobalScope, ScopeError, ScopeId};
use crate::lang::typed::{TypedExpr, TypedExprKind, TypedFunction, TypedProgram, TypedStmt};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveErrorKind {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("cannot find function {0}")]
    UnknownFunction(String),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: DataType, found: DataType },

    #[error("left hand side of operator '=' must be a variable")]
    AssignTarget,

    #[error("return outside of a function")]
    ReturnOutsideFunction,

    #[error("function returning {0} must return a value")]
    MissingReturnValue(DataType),

    #[error("void function cannot return a value")]
    UnexpectedReturnValue,

    #[error("variables of type {0} are not supported")]
    UnsupportedVariableType(DataType),

    #[error("functions returning {0} are not supported")]
    UnsupportedReturnType(DataType),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{}: {}", .span.line, .span.col, .kind)]
pub struct ResolveError {
    pub kind: ResolveErrorKind,
    pub span: Span,
}

impl ResolveErrorKind {
    fn at(self, span: Span) -> ResolveError {
        ResolveError { kind: self, span }
    }
}

/// Resolves names and types, building the scope tree inside `global`.
///
/// The main block gets its own scope below the root, so the return-address
/// cell stays in slot 0 and main's variables follow it.
pub fn resolve(program: &Program, global: &mut GlobalScope) -> Result<TypedProgram, ResolveError> {
    let mut resolver = Resolver {
        global,
        functions: Vec::new(),
        return_type: None,
    };
    let root = resolver.global.root();
    let main_scope = resolver.global.new_scope(root);
    let main = resolver.resolve_block(&program.statements, main_scope)?;

    debug!(
        statements = main.len(),
        functions = resolver.functions.len(),
        "resolved program"
    );
    Ok(TypedProgram {
        main,
        functions: resolver.functions,
    })
}

struct Resolver<'g> {
    global: &'g mut GlobalScope,
    functions: Vec<TypedFunction>,
    /// Return type of the function being resolved; None in main.
    return_type: Option<DataType>,
}

impl Resolver<'_> {
    /// Declares the block's functions first, so calls may precede declarations
    /// and functions may be mutually recursive.
    fn resolve_block(
        &mut self,
        stmts: &[Stmt],
        scope: ScopeId,
    ) -> Result<Vec<TypedStmt>, ResolveError> {
        let mut declared = Vec::new();
        for stmt in stmts {
            if let Stmt::Func(decl) = stmt {
                declared.push(self.declare_function(decl, scope)?);
            }
        }

        let mut declared = declared.into_iter();
        let mut out = Vec::new();
        for stmt in stmts {
            match stmt {
                Stmt::Func(decl) => {
                    if let Some(func) = declared.next() {
                        let function = self.resolve_function(decl, func, scope)?;
                        self.functions.push(function);
                    }
                }
                other => out.push(self.resolve_statement(other, scope)?),
            }
        }
        Ok(out)
    }

    fn declare_function(
        &mut self,
        decl: &FuncDecl,
        scope: ScopeId,
    ) -> Result<FuncId, ResolveError> {
        if !matches!(decl.return_type, DataType::Void | DataType::Int) {
            return Err(ResolveErrorKind::UnsupportedReturnType(decl.return_type).at(decl.span));
        }
        let params = decl.params.iter().map(|p| p.ty).collect();
        let function = Function::user(decl.name.clone(), params, decl.return_type);
        self.global
            .declare_function(scope, function)
            .map_err(|e| ResolveErrorKind::from(e).at(decl.span))
    }

    fn resolve_function(
        &mut self,
        decl: &FuncDecl,
        func: FuncId,
        scope: ScopeId,
    ) -> Result<TypedFunction, ResolveError> {
        let frame = self.global.new_scope(scope);
        let mut params = Vec::new();
        for p in &decl.params {
            if p.ty != DataType::Int {
                return Err(ResolveErrorKind::UnsupportedVariableType(p.ty).at(p.span));
            }
            let var = self
                .global
                .declare_variable(frame, &p.name, p.ty)
                .map_err(|e| ResolveErrorKind::from(e).at(p.span))?;
            params.push(var);
        }

        let outer = self.return_type.replace(decl.return_type);
        let body = self.resolve_statement(&decl.body, frame);
        self.return_type = outer;

        Ok(TypedFunction {
            func,
            params,
            return_type: decl.return_type,
            body: body?,
        })
    }

    fn resolve_statement(
        &mut self,
        stmt: &Stmt,
        scope: ScopeId,
    ) -> Result<TypedStmt, ResolveError> {
        match stmt {
            Stmt::Block(stmts) => {
                let inner = self.global.new_scope(scope);
                Ok(TypedStmt::Block(self.resolve_block(stmts, inner)?))
            }
            Stmt::Var { name, value, span } => {
                let value = self.resolve_expression(value, scope)?;
                expect_type(&value, DataType::Int, *span)?;
                let var = self
                    .global
                    .declare_variable(scope, name, value.ty)
                    .map_err(|e| ResolveErrorKind::from(e).at(*span))?;
                Ok(TypedStmt::Var { var, value })
            }
            Stmt::Expr(expr) => Ok(TypedStmt::Expr(self.resolve_expression(expr, scope)?)),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.resolve_condition(cond, scope)?;
                let then_branch = Box::new(self.resolve_statement(then_branch, scope)?);
                let else_branch = match else_branch {
                    Some(stmt) => Some(Box::new(self.resolve_statement(stmt, scope)?)),
                    None => None,
                };
                Ok(TypedStmt::If {
                    cond,
                    then_branch,
                    else_branch,
                })
            }
            Stmt::While { cond, body } => {
                let cond = self.resolve_condition(cond, scope)?;
                let body = Box::new(self.resolve_statement(body, scope)?);
                Ok(TypedStmt::While { cond, body })
            }
            Stmt::DoWhile { body, cond } => {
                let body = Box::new(self.resolve_statement(body, scope)?);
                let cond = self.resolve_condition(cond, scope)?;
                Ok(TypedStmt::DoWhile { body, cond })
            }
            Stmt::Return { value, span } => {
                let expected = self
                    .return_type
                    .ok_or_else(|| ResolveErrorKind::ReturnOutsideFunction.at(*span))?;
                let value = match (value, expected) {
                    (None, DataType::Void) => None,
                    (None, ty) => return Err(ResolveErrorKind::MissingReturnValue(ty).at(*span)),
                    (Some(_), DataType::Void) => {
                        return Err(ResolveErrorKind::UnexpectedReturnValue.at(*span));
                    }
                    (Some(expr), ty) => {
                        let value = self.resolve_expression(expr, scope)?;
                        expect_type(&value, ty, expr.span)?;
                        Some(value)
                    }
                };
                Ok(TypedStmt::Return { value })
            }
            Stmt::Func(decl) => {
                // only reachable for a function used directly as a branch body
                let func = self.declare_function(decl, scope)?;
                let function = self.resolve_function(decl, func, scope)?;
                self.functions.push(function);
                Ok(TypedStmt::Block(Vec::new()))
            }
        }
    }

    fn resolve_condition(
        &mut self,
        cond: &Expr,
        scope: ScopeId,
    ) -> Result<TypedExpr, ResolveError> {
        let typed = self.resolve_expression(cond, scope)?;
        expect_type(&typed, DataType::LaxBool, cond.span)?;
        Ok(typed)
    }

    fn resolve_expression(
        &mut self,
        expr: &Expr,
        scope: ScopeId,
    ) -> Result<TypedExpr, ResolveError> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(TypedExpr {
                kind: TypedExprKind::Number(*n),
                ty: DataType::Int,
            }),
            ExprKind::Variable(name) => {
                let var = self
                    .global
                    .find_variable(scope, name)
                    .ok_or_else(|| {
                        ResolveErrorKind::UndefinedVariable(name.clone()).at(expr.span)
                    })?;
                Ok(TypedExpr {
                    kind: TypedExprKind::Variable(var),
                    ty: self.global.variable(var).ty,
                })
            }
            ExprKind::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|a| self.resolve_expression(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                self.resolve_call(name, args, scope, expr.span)
            }
            ExprKind::Binary {
                op: BinaryOp::Assign,
                lhs,
                rhs,
            } => {
                if !matches!(lhs.kind, ExprKind::Variable(_)) {
                    return Err(ResolveErrorKind::AssignTarget.at(expr.span));
                }
                let target = self.resolve_expression(lhs, scope)?;
                let TypedExprKind::Variable(var) = target.kind else {
                    return Err(ResolveErrorKind::AssignTarget.at(expr.span));
                };
                let value = self.resolve_expression(rhs, scope)?;

                // the '=' builtin only validates the operand types
                let signature = [target.ty, value.ty];
                let assign = self
                    .global
                    .find_function(scope, BinaryOp::Assign.symbol(), &signature)
                    .ok_or_else(|| {
                        let shown = format_signature("=", &signature);
                        ResolveErrorKind::UnknownFunction(shown).at(expr.span)
                    })?;
                let ty = self.global.function(assign).return_type;

                Ok(TypedExpr {
                    kind: TypedExprKind::Assign {
                        var,
                        value: Box::new(value),
                    },
                    ty,
                })
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.resolve_expression(lhs, scope)?;
                let rhs = self.resolve_expression(rhs, scope)?;
                self.resolve_call(op.symbol(), vec![lhs, rhs], scope, expr.span)
            }
        }
    }

    fn resolve_call(
        &mut self,
        name: &str,
        args: Vec<TypedExpr>,
        scope: ScopeId,
        span: Span,
    ) -> Result<TypedExpr, ResolveError> {
        let signature: Vec<DataType> = args.iter().map(|a| a.ty).collect();
        let func = self
            .global
            .find_function(scope, name, &signature)
            .ok_or_else(|| {
                ResolveErrorKind::UnknownFunction(format_signature(name, &signature)).at(span)
            })?;
        Ok(TypedExpr {
            kind: TypedExprKind::Call { func, args },
            ty: self.global.function(func).return_type,
        })
    }
}

fn expect_type(expr: &TypedExpr, expected: DataType, span: Span) -> Result<(), ResolveError> {
    if expr.ty.accepts_as(expected) {
        Ok(())
    } else {
        Err(ResolveErrorKind::TypeMismatch {
            expected,
            found: expr.ty,
        }
        .at(span))
    }
}

fn format_signature(name: &str, args: &[DataType]) -> String {
    let args: Vec<&str> = args.iter().map(|t| t.name()).collect();
    format!("{}({})", name, args.join(", "))
}
