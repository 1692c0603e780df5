//! # tapec
//!
//! Compiler from a small structured language to tape code: a single byte
//! tape, one pointer and the eight commands `< > + - . , [ ]`.
//!
//! ```text
//! source ─► tokens ─► syntax tree ─► typed tree ─► ProgramIr
//!        ─► insert-methods ─► jumps-to-fsm ─► CodeWriter ─► tape code
//! ```
//!
//! The target has no jumps and no addressing, so every label and call is
//! compiled into one state machine, return addresses travel on the evaluation
//! stack, and locals are reached by walking the tape to a sentinel cell.

pub mod codegen;
pub mod frontend;
pub mod ir;
pub mod lang;
pub mod pass;
pub mod runtime;

use thiserror::Error;
use tracing::debug;

use crate::codegen::writer::{CodegenConfig, CodegenError};
use crate::frontend::lexer::{Lexer, LexerError};
use crate::frontend::parser::Parser;
use crate::frontend::parser_error::ParserError;
use crate::frontend::resolve::{ResolveError, resolve};
use crate::ir::compile::Compiler;
use crate::ir::compile_error::CompileError;
use crate::ir::instruction::{Instruction, InstructionError};
use crate::ir::program::{ProgramIr, ProgramIrError};
use crate::ir::stack_check::{self, StackCheckError};
use crate::lang::node::Program;
use crate::lang::scope::GlobalScope;
use crate::pass::insert_methods::InsertMethodsPass;
use crate::pass::jumps_to_fsm::JumpsToFsmPass;
use crate::pass::{CompilerPass, PassError};
use crate::runtime::runtime_error::RuntimeError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error: {0}")]
    Lexer(#[from] LexerError),

    #[error("parse error: {0}")]
    Parser(#[from] ParserError),

    #[error("error: {0}")]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    StackCheck(#[from] StackCheckError),

    #[error(transparent)]
    Instruction(#[from] InstructionError),

    #[error(transparent)]
    ProgramIr(#[from] ProgramIrError),

    #[error(transparent)]
    Pass(#[from] PassError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub codegen: CodegenConfig,
}

pub fn parse(source: &str) -> Result<Program, Error> {
    let tokens = Lexer::new(source).tokenize()?;
    Ok(Parser::new(tokens).parse()?)
}

/// Front end: parses, resolves and lowers `source` to flat IR.
pub fn compile_to_ir(source: &str) -> Result<ProgramIr, Error> {
    let program = parse(source)?;
    let mut global = GlobalScope::generate();
    let typed = resolve(&program, &mut global)?;
    let ir = Compiler::new(&mut global).compile_program(&typed)?;

    // underflow in main, up to its first call
    stack_check::check(&ir.main)?;
    debug!(
        main = ir.main.len(),
        functions = ir.functions.len(),
        "front end done"
    );
    Ok(ir)
}

/// Runs the passes, leaving a single stream without labels or jumps.
pub fn lower(program: &ProgramIr) -> Result<Vec<Instruction>, Error> {
    let insert = InsertMethodsPass::new(&program.functions, program.next_label);
    let fsm = JumpsToFsmPass::new();
    let passes: [&dyn CompilerPass; 2] = [&insert, &fsm];

    let mut insns = program.main.clone();
    for pass in passes {
        insns = pass.run(&insns)?;
        debug!(pass = pass.name(), instructions = insns.len(), "pass done");
    }
    Ok(insns)
}

pub fn generate(insns: &[Instruction], config: &CodegenConfig) -> Result<String, Error> {
    Ok(codegen::writer::generate(insns, config)?)
}

/// Whole pipeline from source text to tape code.
pub fn compile_source(source: &str, options: &CompileOptions) -> Result<String, Error> {
    let ir = compile_to_ir(source)?;
    let insns = lower(&ir)?;
    generate(&insns, &options.codegen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tape_vm::{TapeVmConfig, run_program};

    fn run(source: &str, input: &[u8]) -> Vec<u8> {
        let code = compile_source(source, &CompileOptions::default()).unwrap();
        let config = TapeVmConfig {
            max_steps: Some(50_000_000),
            ..TapeVmConfig::default()
        };
        run_program(&code, input, config).unwrap()
    }

    const SUM: &str = "
        func sum(n: int): int {
            if (n) {
                return n + sum(n - 1);
            }
            return 0;
        }
        printNumber(sum(readDigit()));
    ";

    #[test]
    fn test_print_char() {
        assert_eq!(run("print(72);", b""), b"H");
    }

    #[test]
    fn test_variable_update() {
        assert_eq!(run("var a = 5; a = a + 1; print(a);", b""), vec![6]);
    }

    #[test]
    fn test_if_else() {
        let source = "if (read()) { print(1); } else { print(0); }";
        assert_eq!(run(source, &[1]), vec![1]);
        assert_eq!(run(source, &[0]), vec![0]);
        assert_eq!(run(source, &[7]), vec![1]);
    }

    #[test]
    fn test_while() {
        assert_eq!(run("while (read()) { print(1); }", &[1, 1, 0]), vec![1, 1]);
    }

    #[test]
    fn test_countdown() {
        let source = "var i = 3; while (i) { printNumber(i); i = i - 1; }";
        assert_eq!(run(source, b""), b"321");
    }

    #[test]
    fn test_do_while() {
        let source = "var c = 'a'; do { print(c); c = c + 1; } while (c == 'd' == 0);";
        assert_eq!(run(source, b""), b"abc");
    }

    #[test]
    fn test_recursive_sum() {
        assert_eq!(run(SUM, b"0"), b"0");
        assert_eq!(run(SUM, b"1"), b"1");
        assert_eq!(run(SUM, b"3"), b"6");
        assert_eq!(run(SUM, b"5"), b"15");
    }

    #[test]
    fn test_calls_do_not_leak_state() {
        let source = "
            func id(x: int): int { return x; }
            printNumber(id(0));
            printNumber(id(1));
        ";
        assert_eq!(run(source, b""), b"01");
    }

    #[test]
    fn test_frame_after_main_locals() {
        let source = "
            var a = 3;
            func inc(x: int): int { return x + 1; }
            print(inc(a));
            print(a);
        ";
        assert_eq!(run(source, b""), vec![4, 3]);
    }

    #[test]
    fn test_void_function() {
        let source = "func show(c: int) { print(c); } show('A'); show('B');";
        assert_eq!(run(source, b""), b"AB");
    }

    #[test]
    fn test_operators() {
        assert_eq!(run("print(4 + 5);", b""), vec![9]);
        assert_eq!(run("print(5 - 2);", b""), vec![3]);
        assert_eq!(run("print(6 * 3);", b""), vec![18]);
        assert_eq!(run("print(7 / 3);", b""), vec![2]);
        assert_eq!(run("print(1 > 2);", b""), vec![0]);
        assert_eq!(run("print(3 > 2);", b""), vec![1]);
        assert_eq!(run("print(2 == 2);", b""), vec![1]);
        assert_eq!(run("print(1 + 2 * 3);", b""), vec![7]);
    }

    #[test]
    fn test_operator_edges() {
        assert_eq!(run("var d = 1; print(9 / d);", b""), vec![9]);
        assert_eq!(run("print(255 / 1);", b""), vec![255]);
        assert_eq!(run("print(0 / 3);", b""), vec![0]);
        assert_eq!(run("print(2 / 5);", b""), vec![0]);
        assert_eq!(run("print(255 / 255);", b""), vec![1]);
        assert_eq!(run("print(7 * 0);", b""), vec![0]);
        assert_eq!(run("print(1 * 200);", b""), vec![200]);
        assert_eq!(run("print(0 > 0);", b""), vec![0]);
        assert_eq!(run("print(255 > 0);", b""), vec![1]);
        assert_eq!(run("print(0 > 255);", b""), vec![0]);
        assert_eq!(run("printNumber(100 / 1);", b""), b"100");
    }

    #[test]
    fn test_straight_line_has_no_fsm() {
        let ir = compile_to_ir("print(1);").unwrap();
        let insns = lower(&ir).unwrap();
        assert_eq!(insns, ir.main);
    }

    #[test]
    fn test_ir_survives_serialization() {
        let ir = compile_to_ir(SUM).unwrap();
        let loaded = ProgramIr::from_bytes(&ir.to_bytes().unwrap()).unwrap();
        let options = CompileOptions::default();
        assert_eq!(
            generate(&lower(&loaded).unwrap(), &options.codegen).unwrap(),
            compile_source(SUM, &options).unwrap()
        );
    }

    #[test]
    fn test_debug_build_behaves_the_same() {
        let options = CompileOptions {
            codegen: CodegenConfig {
                debug_info: true,
                debug_breakpoint: true,
                ..CodegenConfig::default()
            },
        };
        let code = compile_source(SUM, &options).unwrap();
        assert!(code.contains("fsmBegin("));
        assert_eq!(run_program(&code, b"4", TapeVmConfig::default()).unwrap(), b"10");
    }

    #[test]
    fn test_front_end_errors() {
        let err = compile_source("print(x);", &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Resolve(_)));
        assert_eq!(err.to_string(), "error: 1:7: undefined variable 'x'");

        let err = compile_source("print(1)", &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Parser(_)));

        let err = compile_source("print(256);", &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Lexer(_)));
    }
}
