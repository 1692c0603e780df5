use std::collections::BTreeMap;

use tracing::debug;

use crate::ir::compile_error::CompileError;
use crate::ir::instruction::Instruction;
use crate::ir::program::ProgramIr;
use crate::ir::prototype::Opcode;
use crate::lang::data_type::DataType;
use crate::lang::scope::{GlobalScope, VarId};
use crate::lang::typed::{TypedExpr, TypedExprKind, TypedFunction, TypedProgram, TypedStmt};

/// Lowers a resolved program to flat IR.
///
/// Control flow becomes `label`/`jump`/`jumpIf`, calls of user functions
/// become `invoke`, builtin calls are replaced by the builtin's body.
///
/// Calling convention: the caller pushes the arguments, `invoke` pushes the
/// return address on top of them. The callee's prologue parks the return
/// address in its slot, pops the arguments into the parameter slots and
/// brings the return address back, so it stays below everything the body
/// pushes. `return` expects the return address on top with the result (if
/// any) right below it.
pub struct Compiler<'g> {
    global: &'g mut GlobalScope,
}

impl<'g> Compiler<'g> {
    pub fn new(global: &'g mut GlobalScope) -> Self {
        Self { global }
    }

    pub fn compile_program(mut self, program: &TypedProgram) -> Result<ProgramIr, CompileError> {
        let mut main = Vec::new();
        for stmt in &program.main {
            self.compile_statement(stmt, &mut main)?;
        }
        debug!(instructions = main.len(), "compiled main");

        let mut functions = BTreeMap::new();
        for function in &program.functions {
            let label = self
                .global
                .function(function.func)
                .id
                .ok_or_else(|| CompileError::internal("user function without a label id"))?;
            let body = self.compile_function(function)?;
            debug!(label, instructions = body.len(), "compiled function");
            functions.insert(label, body);
        }

        Ok(ProgramIr {
            main,
            functions,
            next_label: self.global.peek_label_id(),
        })
    }

    fn compile_function(
        &mut self,
        function: &TypedFunction,
    ) -> Result<Vec<Instruction>, CompileError> {
        let ret = self.layout(self.global.return_address())?;

        let mut out = vec![Instruction::write_local(&ret)];
        for param in function.params.iter().rev() {
            out.push(Instruction::write_local(&self.int_layout(*param, "a parameter")?));
        }
        out.push(Instruction::read_local(&ret));

        self.compile_statement(&function.body, &mut out)?;

        // falling off the end
        match function.return_type {
            DataType::Void => {}
            DataType::Int => {
                out.push(Instruction::push_int(0));
                out.push(Instruction::simple(Opcode::SwapInt));
            }
            other => return Err(CompileError::unsupported(other, "a function result")),
        }
        out.push(Instruction::simple(Opcode::Return));
        Ok(out)
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    fn compile_statement(
        &mut self,
        stmt: &TypedStmt,
        out: &mut Vec<Instruction>,
    ) -> Result<(), CompileError> {
        match stmt {
            TypedStmt::Block(stmts) => {
                for s in stmts {
                    self.compile_statement(s, out)?;
                }
            }
            TypedStmt::Var { var, value } => {
                self.compile_expression(value, out)?;
                out.push(Instruction::write_local(&self.int_layout(*var, "a declaration")?));
            }
            TypedStmt::Expr(expr) => {
                self.compile_expression(expr, out)?;
                // drop the unused result
                match expr.ty {
                    DataType::Void => {}
                    DataType::Int => out.push(Instruction::simple(Opcode::PopInt)),
                    other => {
                        return Err(CompileError::unsupported(other, "an expression statement"));
                    }
                }
            }
            TypedStmt::If {
                cond,
                then_branch,
                else_branch: None,
            } => {
                // cond; not; jumpIf #end; then; #end
                let end = self.global.next_label_id();
                self.compile_expression(cond, out)?;
                out.push(Instruction::simple(Opcode::Not));
                out.push(Instruction::jump_if(end));
                self.compile_statement(then_branch, out)?;
                out.push(Instruction::label(end));
            }
            TypedStmt::If {
                cond,
                then_branch,
                else_branch: Some(else_branch),
            } => {
                // cond; jumpIf #true; else; jump #end; #true; then; #end
                let on_true = self.global.next_label_id();
                let end = self.global.next_label_id();
                self.compile_expression(cond, out)?;
                out.push(Instruction::jump_if(on_true));
                self.compile_statement(else_branch, out)?;
                out.push(Instruction::jump(end));
                out.push(Instruction::label(on_true));
                self.compile_statement(then_branch, out)?;
                out.push(Instruction::label(end));
            }
            TypedStmt::While { cond, body } => {
                // #start; cond; not; jumpIf #end; body; jump #start; #end
                let start = self.global.next_label_id();
                let end = self.global.next_label_id();
                out.push(Instruction::label(start));
                self.compile_expression(cond, out)?;
                out.push(Instruction::simple(Opcode::Not));
                out.push(Instruction::jump_if(end));
                self.compile_statement(body, out)?;
                out.push(Instruction::jump(start));
                out.push(Instruction::label(end));
            }
            TypedStmt::DoWhile { body, cond } => {
                // #start; body; cond; jumpIf #start
                let start = self.global.next_label_id();
                out.push(Instruction::label(start));
                self.compile_statement(body, out)?;
                self.compile_expression(cond, out)?;
                out.push(Instruction::jump_if(start));
            }
            TypedStmt::Return { value } => {
                if let Some(value) = value {
                    self.compile_expression(value, out)?;
                    out.push(Instruction::simple(Opcode::SwapInt));
                }
                out.push(Instruction::simple(Opcode::Return));
            }
        }
        Ok(())
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    fn compile_expression(
        &mut self,
        expr: &TypedExpr,
        out: &mut Vec<Instruction>,
    ) -> Result<(), CompileError> {
        match &expr.kind {
            TypedExprKind::Number(n) => out.push(Instruction::push_int(i32::from(*n))),
            TypedExprKind::Variable(var) => {
                // reads are destructive, so write the value back
                let layout = self.int_layout(*var, "a variable read")?;
                out.push(Instruction::read_local(&layout));
                out.push(Instruction::simple(Opcode::DupInt));
                out.push(Instruction::write_local(&layout));
            }
            TypedExprKind::Assign { var, value } => {
                self.compile_expression(value, out)?;
                out.push(Instruction::simple(Opcode::DupInt));
                out.push(Instruction::write_local(&self.int_layout(*var, "an assignment")?));
            }
            TypedExprKind::Call { func, args } => {
                for arg in args {
                    self.compile_expression(arg, out)?;
                }
                let function = self.global.function(*func);
                if function.is_builtin {
                    out.extend(function.body.iter().cloned());
                } else {
                    let id = function.id.ok_or_else(|| {
                        let name = &function.name;
                        CompileError::internal(format!("function '{}' has no label id", name))
                    })?;
                    out.push(Instruction::invoke(id));
                }
            }
        }
        Ok(())
    }

    fn layout(&self, var: VarId) -> Result<Vec<DataType>, CompileError> {
        self.global.heap_layout(var).ok_or_else(|| {
            let name = &self.global.variable(var).name;
            CompileError::internal(format!("variable '{}' has no heap slot", name))
        })
    }

    /// Heap layout of an int variable.
    fn int_layout(
        &self,
        var: VarId,
        context: &'static str,
    ) -> Result<Vec<DataType>, CompileError> {
        match self.global.variable(var).ty {
            DataType::Int => self.layout(var),
            other => Err(CompileError::unsupported(other, context)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use crate::frontend::resolve::resolve;
    use crate::ir::instruction::{listing_to_string, parse_listing};

    fn compile(source: &str) -> ProgramIr {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse().unwrap();
        let mut global = GlobalScope::generate();
        let typed = resolve(&program, &mut global).unwrap();
        Compiler::new(&mut global).compile_program(&typed).unwrap()
    }

    fn assert_main(source: &str, expected: &str) {
        let program = compile(source);
        let expected = parse_listing(expected).unwrap();
        assert_eq!(
            program.main,
            expected,
            "\nexpected = {}\nactual   = {}",
            listing_to_string(&expected),
            listing_to_string(&program.main)
        );
    }

    #[test]
    fn test_print_literal() {
        assert_main("print(72);", "pushInt[72]; printChar[]; popInt[]");
    }

    #[test]
    fn test_variables() {
        assert_main(
            "var a = 5; a = a + 1;",
            "pushInt[5]; writeLocal[4,1];
             readLocal[4,1]; dupInt[]; writeLocal[4,1]; pushInt[1]; add[];
             dupInt[]; writeLocal[4,1]; popInt[]",
        );
    }

    #[test]
    fn test_equality_is_sub_not() {
        assert_main("read() == 'x';", "readChar[]; pushInt[120]; sub[]; not[]; popInt[]");
    }

    #[test]
    fn test_if_without_else() {
        assert_main(
            "if (read()) print(1);",
            "readChar[]; not[]; jumpIf[0]; pushInt[1]; printChar[]; popInt[]; label[0]",
        );
    }

    #[test]
    fn test_if_else() {
        assert_main(
            "if (read()) print(1); else print(0);",
            "readChar[]; jumpIf[0];
             pushInt[0]; printChar[]; popInt[]; jump[1];
             label[0]; pushInt[1]; printChar[]; popInt[];
             label[1]",
        );
    }

    #[test]
    fn test_while() {
        assert_main(
            "while (read()) print(1);",
            "label[0]; readChar[]; not[]; jumpIf[1];
             pushInt[1]; printChar[]; popInt[]; jump[0]; label[1]",
        );
    }

    #[test]
    fn test_do_while() {
        assert_main(
            "do print(read()); while (read());",
            "label[0]; readChar[]; printChar[]; popInt[]; readChar[]; jumpIf[0]",
        );
    }

    #[test]
    fn test_user_call_and_prologue() {
        let program = compile("func id(x: int): int { return x; } print(id(7));");
        assert_eq!(
            program.main,
            parse_listing("pushInt[7]; invoke[0]; printChar[]; popInt[]").unwrap()
        );
        assert_eq!(
            program.functions[&0],
            parse_listing(
                "writeLocal[4]; writeLocal[4,1]; readLocal[4];
                 readLocal[4,1]; dupInt[]; writeLocal[4,1]; swapInt[]; return[];
                 pushInt[0]; swapInt[]; return[]"
            )
            .unwrap()
        );
        assert_eq!(program.next_label, 1);
    }

    #[test]
    fn test_parameters_are_popped_last_first() {
        let program = compile("func f(a: int, b: int) { } f(1, 2);");
        assert_eq!(
            program.functions[&0],
            parse_listing(
                "writeLocal[4]; writeLocal[4,1,1]; writeLocal[4,1]; readLocal[4]; return[]"
            )
            .unwrap()
        );
    }

    #[test]
    fn test_labels_after_function_ids() {
        let program = compile("func f() { while (read()) print(1); } f();");
        assert_eq!(program.main, parse_listing("invoke[0]").unwrap());
        assert!(program.functions[&0].contains(&Instruction::label(1)));
        assert!(program.functions[&0].contains(&Instruction::label(2)));
        assert_eq!(program.next_label, 3);
    }
}
