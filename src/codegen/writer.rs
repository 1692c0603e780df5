use std::fmt;

use thiserror::Error;
use tracing::{debug, trace};

use crate::codegen::fsm::{FsmOffsetError, case_offset};
use crate::ir::instruction::Instruction;
use crate::ir::prototype::Opcode;
use crate::lang::data_type::DataType;

/// Largest case count a state machine may have. Every value the dispatcher
/// sees must fit a cell, and a return adds up to `2 * count + 1`.
pub const MAX_FSM_CASES: i32 = 127;

const FSM_END_CASE: &str = ">]<";

const PRINT_INT: &str = "[>>+>+<<<-]>>>[<<<+>>>-]<<+>[<->[>++++++++++<\
    [->-[>+>>]>[+[-<+>]>+>>]<<<<<]>[-]++++++++[<++++++>-]>\
    [<<+>>-]>[<<+>>-]<<]>]<[->>++++++++[<++++++>-]]<[.[-]<]<";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("codegen error: unsupported instruction: {0}")]
    Unsupported(&'static str),

    #[error("codegen error: missing argument {index} of {name}")]
    MissingArgument { name: &'static str, index: usize },

    #[error("codegen error: heap layout is empty")]
    EmptyLayout,

    #[error("codegen error: unknown data type id {0}")]
    UnknownDataType(i32),

    #[error("codegen error: no movement commands found for type {0}")]
    NotHeapStorable(DataType),

    #[error("codegen error: illegal case count: declared {declared}, found {found}")]
    CaseCountMismatch { declared: i32, found: i32 },

    #[error("codegen error: {0} outside of an fsm")]
    OutsideFsm(&'static str),

    #[error("codegen error: {0} fsm block(s) left open")]
    UnterminatedFsm(usize),

    #[error("codegen error: fsm with {count} cases exceeds the limit of {max}")]
    TooManyCases { count: i32, max: i32 },

    #[error("codegen error: {0}")]
    FsmOffset(#[from] FsmOffsetError),

    #[error("codegen error: writing output failed")]
    Fmt(#[from] fmt::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenConfig {
    /// Write every top-level instruction as an inert comment line.
    pub debug_info: bool,
    /// Put a breakpoint before every top-level instruction.
    pub debug_breakpoint: bool,
    pub breakpoint_char: char,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        CodegenConfig {
            debug_info: false,
            debug_breakpoint: false,
            breakpoint_char: '#',
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FsmFrame {
    case: i32,
    count: i32,
}

/// `( a b -- a/b )` by repeated subtraction. Scratch above `b` holds the
/// countdown `r`, the quotient `q` and a zero test; every time `r` hits zero
/// `q` grows and `r` is reloaded from `b`. Division by zero yields 0.
const DIV: &str = concat!(
    "[->+>>+<<<]>>>[-<<<+>>>]<<<<",
    "[->>-[->>+>+<<<]>>>[-<<<+>>>]<[>+<[-]]+>[<->-]<[-<+<<[->+>>+<<<]>>>[-<<<+>>>]]<<<<]",
    ">[-]>[-]>[-<<<+>>>]<<<",
);

/// Renders fsm-form instructions as tape code.
///
/// The evaluation stack lives on the even cells right of the origin, the
/// pointer resting on the top value. Stack templates are written in value
/// units and every pointer move is doubled on output. Locals live left of a
/// 255 sentinel at cell -1 and are reached by walking over the link cells;
/// those walks are emitted as they are.
pub struct CodeWriter<W: fmt::Write> {
    out: W,
    config: CodegenConfig,
    fsm: Vec<FsmFrame>,
    written: usize,
}

impl<W: fmt::Write> CodeWriter<W> {
    pub fn new(out: W) -> Self {
        Self::with_config(out, CodegenConfig::default())
    }

    pub fn with_config(out: W, config: CodegenConfig) -> Self {
        Self {
            out,
            config,
            fsm: Vec::new(),
            written: 0,
        }
    }

    fn emit_debug(&self) -> bool {
        self.config.debug_info || self.config.debug_breakpoint
    }

    /// Writes the heap sentinel. Must come before any instruction.
    pub fn begin(&mut self) -> Result<(), CodegenError> {
        self.raw("<->")?;
        self.comment_line("")
    }

    /// Writes one top-level instruction.
    pub fn write(&mut self, insn: &Instruction) -> Result<(), CodegenError> {
        trace!(insn = %insn, "write");
        if self.emit_debug() {
            if self.config.debug_breakpoint {
                self.out.write_char(self.config.breakpoint_char)?;
            }
            self.comment_line(&insn.to_string())?;
        }
        self.emit(insn)?;
        self.written += 1;
        self.comment_line("")
    }

    pub fn write_all(&mut self, insns: &[Instruction]) -> Result<(), CodegenError> {
        insns.iter().try_for_each(|insn| self.write(insn))
    }

    /// Checks that every state machine was closed and hands back the output.
    pub fn finish(self) -> Result<W, CodegenError> {
        if !self.fsm.is_empty() {
            return Err(CodegenError::UnterminatedFsm(self.fsm.len()));
        }
        debug!(instructions = self.written, "code written");
        Ok(self.out)
    }

    // ==========================================================================
    // Instruction templates
    // ==========================================================================

    fn emit(&mut self, insn: &Instruction) -> Result<(), CodegenError> {
        match insn.opcode() {
            Opcode::Nop => Ok(()),
            Opcode::Breakpoint => {
                self.out.write_char(self.config.breakpoint_char)?;
                Ok(())
            }
            Opcode::ReadChar => self.source(">,"),
            Opcode::PrintChar => self.source("."),
            Opcode::PrintInt => self.source(PRINT_INT),
            Opcode::PushInt => self.push_int(arg(insn, 0)?),
            Opcode::PopInt => self.pop_int(),
            Opcode::DupInt => self.source("[->+>+<<]>>[-<<+>>]<"),
            Opcode::SwapInt => self.source("[->+<]<[->+<]>>[-<<+>>]<"),
            Opcode::Not => self.source("[>+<[-]]+>[<->-]<"),
            Opcode::Add => self.source("[-<+>]<"),
            Opcode::Sub => self.source("[-<->]<"),
            Opcode::Mul => {
                self.source("<[>>>+<<<-]>>>[<<[<+>>+<-]>[<+>-]>-]<<")?;
                self.pop_int()
            }
            Opcode::Div => self.source(DIV),
            Opcode::Greater => {
                self.source("<[>>>+<<[->>[-]>+<<<]>>[-<+>]>[-<<<+>>>]<<<-<-]>>[-<<+>>]<")?;
                self.pop_int()
            }
            Opcode::IfElseBegin => self.if_else_begin(),
            Opcode::IfElseElse => self.if_else_else(),
            Opcode::IfElseEnd => self.if_else_end(),
            Opcode::WriteLocal => {
                let (to_heap, to_stack, _) = self.heap_walk(insn)?;
                self.raw(&format!("{to_heap}[-]{to_stack}[-{to_heap}+{to_stack}]<<"))
            }
            Opcode::ReadLocal => {
                let (to_heap, to_stack, _) = self.heap_walk(insn)?;
                self.raw(&format!(">>{to_heap}[-{to_stack}+{to_heap}]{to_stack}"))
            }
            Opcode::ClearLocal => {
                let (to_heap, to_stack, ty) = self.heap_walk(insn)?;
                let clear = ty.clear().ok_or(CodegenError::NotHeapStorable(ty))?;
                self.raw(&format!("{to_heap}{clear}{to_stack}"))
            }
            Opcode::FsmBegin => self.fsm_begin(arg(insn, 0)?),
            Opcode::FsmEnd => self.fsm_end(),
            Opcode::FsmCase => self.fsm_case(),
            Opcode::FsmJmp => self.fsm_jmp(arg(insn, 0)?),
            Opcode::FsmIf => self.fsm_if(arg(insn, 0)?, arg(insn, 1)?),
            Opcode::FsmCall => {
                let frame = self.frame("fsmCall")?;
                // return address: the case after this one
                self.push_int(frame.case + 1)?;
                self.fsm_jmp(arg(insn, 0)?)
            }
            Opcode::FsmReturn => {
                let frame = self.frame("fsmReturn")?;
                self.push_int(frame.count - frame.case + 1)?;
                self.source("[-<+>]<")?;
                self.source(FSM_END_CASE)
            }
            op @ (Opcode::Jump
            | Opcode::JumpIf
            | Opcode::Label
            | Opcode::Invoke
            | Opcode::Return) => Err(CodegenError::Unsupported(op.name())),
        }
    }

    fn push_int(&mut self, value: i32) -> Result<(), CodegenError> {
        let n = value.rem_euclid(256) as usize;
        self.source(&format!(">{}", "+".repeat(n)))
    }

    fn pop_int(&mut self) -> Result<(), CodegenError> {
        self.source("[-]<")
    }

    fn if_else_begin(&mut self) -> Result<(), CodegenError> {
        self.raw(">+<[>-<")?;
        self.pop_int()
    }

    fn if_else_else(&mut self) -> Result<(), CodegenError> {
        self.raw(">]>[-<")?;
        // the condition cell is already zero here
        self.source("<")
    }

    fn if_else_end(&mut self) -> Result<(), CodegenError> {
        self.raw(">>]<<")
    }

    // ==========================================================================
    // State machines
    // ==========================================================================

    fn frame(&self, what: &'static str) -> Result<FsmFrame, CodegenError> {
        self.fsm.last().copied().ok_or(CodegenError::OutsideFsm(what))
    }

    fn offset(&self, what: &'static str, target: i32) -> Result<i32, CodegenError> {
        let frame = self.frame(what)?;
        Ok(case_offset(frame.case, target, frame.count)?)
    }

    fn fsm_begin(&mut self, count: i32) -> Result<(), CodegenError> {
        if count > MAX_FSM_CASES {
            return Err(CodegenError::TooManyCases {
                count,
                max: MAX_FSM_CASES,
            });
        }
        debug!(cases = count, depth = self.fsm.len(), "fsm begin");
        self.fsm.push(FsmFrame { case: 0, count });
        self.push_int(1)?;
        self.source("[")
    }

    fn fsm_end(&mut self) -> Result<(), CodegenError> {
        let frame = self.frame("fsmEnd")?;
        self.source("-]<")?;
        if frame.case != frame.count {
            return Err(CodegenError::CaseCountMismatch {
                declared: frame.count,
                found: frame.case,
            });
        }
        self.fsm.pop();
        Ok(())
    }

    fn fsm_case(&mut self) -> Result<(), CodegenError> {
        let frame = self.fsm.last_mut().ok_or(CodegenError::OutsideFsm("fsmCase"))?;
        frame.case += 1;
        self.source("-")?;
        self.source("[->+>+<<]>>[-<<+>>]<")?;
        self.source("[>+<[-]]+>[<->-]<")?;
        self.source("[-<<")
    }

    fn fsm_jmp(&mut self, target: i32) -> Result<(), CodegenError> {
        let offset = self.offset("fsmJmp", target)?;
        self.push_int(offset)?;
        self.source(FSM_END_CASE)
    }

    fn fsm_if(&mut self, on_true: i32, on_false: i32) -> Result<(), CodegenError> {
        let offset_true = self.offset("fsmIf", on_true)?;
        let offset_false = self.offset("fsmIf", on_false)?;
        self.if_else_begin()?;
        self.push_int(offset_true)?;
        self.if_else_else()?;
        self.push_int(offset_false)?;
        self.if_else_end()?;
        self.source(FSM_END_CASE)
    }

    // ==========================================================================
    // Heap access
    // ==========================================================================

    /// Walks from the stack top to the addressed slot and back.
    ///
    /// The layout lists the types of slots `0..=i`; slot `i` is addressed.
    fn heap_walk(&self, insn: &Instruction) -> Result<(String, String, DataType), CodegenError> {
        let layout = heap_layout(insn.args())?;
        let (&target, before) = layout.split_last().ok_or(CodegenError::EmptyLayout)?;

        let mut to_heap = String::from("<+[<<+]<");
        for ty in before {
            to_heap.push_str(ty.move_left().ok_or(CodegenError::NotHeapStorable(*ty))?);
        }

        let mut to_stack = String::new();
        for ty in before.iter().rev() {
            to_stack.push_str(ty.move_right().ok_or(CodegenError::NotHeapStorable(*ty))?);
        }
        to_stack.push_str(">->>[->>]<");

        Ok((to_heap, to_stack, target))
    }

    // ==========================================================================
    // Output
    // ==========================================================================

    /// Writes a stack template, doubling every pointer move.
    fn source(&mut self, template: &str) -> Result<(), CodegenError> {
        for c in template.chars() {
            match c {
                '<' => self.out.write_str("<<")?,
                '>' => self.out.write_str(">>")?,
                c => self.out.write_char(c)?,
            }
        }
        Ok(())
    }

    fn raw(&mut self, code: &str) -> Result<(), CodegenError> {
        Ok(self.out.write_str(code)?)
    }

    fn comment_line(&mut self, text: &str) -> Result<(), CodegenError> {
        if !self.config.debug_info {
            return Ok(());
        }
        let bp = self.config.breakpoint_char;
        for c in text.chars() {
            self.out.write_char(sanitize(c, bp))?;
        }
        self.out.write_char('\n')?;
        Ok(())
    }
}

/// Maps tape alphabet characters to inert look-alikes.
fn sanitize(c: char, breakpoint: char) -> char {
    match c {
        '<' => '{',
        '>' => '}',
        '-' | '+' => '_',
        '[' => '(',
        ']' => ')',
        '.' => ':',
        ',' => ';',
        c if c == breakpoint => '_',
        c => c,
    }
}

fn arg(insn: &Instruction, index: usize) -> Result<i32, CodegenError> {
    insn.arg(index).ok_or(CodegenError::MissingArgument {
        name: insn.opcode().name(),
        index,
    })
}

fn heap_layout(ids: &[i32]) -> Result<Vec<DataType>, CodegenError> {
    if ids.is_empty() {
        return Err(CodegenError::EmptyLayout);
    }
    ids.iter()
        .map(|&id| {
            let ty = DataType::from_id(id).ok_or(CodegenError::UnknownDataType(id))?;
            if ty.is_heap_storable() {
                Ok(ty)
            } else {
                Err(CodegenError::NotHeapStorable(ty))
            }
        })
        .collect()
}

/// Renders a whole fsm-form stream, sentinel included.
pub fn generate(insns: &[Instruction], config: &CodegenConfig) -> Result<String, CodegenError> {
    let mut writer = CodeWriter::with_config(String::new(), config.clone());
    writer.begin()?;
    writer.write_all(insns)?;
    writer.finish()
}
