use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ir::prototype::{Arity, InstructionPrototype, Opcode};
use crate::lang::data_type::DataType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    #[error("cannot find instruction {0}")]
    UnknownInstruction(String),

    #[error("illegal argument count for {name}: expected {expected}, got {got}")]
    ArgumentCount {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid instruction syntax: '{0}'")]
    Syntax(String),

    #[error("invalid argument '{arg}' in '{text}'")]
    Argument { arg: String, text: String },
}

/// One IR instruction: an opcode plus its integer arguments.
///
/// Construct through [`Instruction::new`] (arity checked) or one of the typed
/// helpers, which are correct by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    opcode: Opcode,
    args: Vec<i32>,
}

impl Instruction {
    pub fn new(opcode: Opcode, args: Vec<i32>) -> Result<Self, InstructionError> {
        let insn = Instruction { opcode, args };
        insn.validate()?;
        Ok(insn)
    }

    /// Checks the argument count against the prototype.
    pub fn validate(&self) -> Result<(), InstructionError> {
        let proto = self.prototype();
        match proto.arity {
            Arity::Fixed(n) if n != self.args.len() => Err(InstructionError::ArgumentCount {
                name: proto.name,
                expected: n,
                got: self.args.len(),
            }),
            _ => Ok(()),
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn prototype(&self) -> &'static InstructionPrototype {
        self.opcode.prototype()
    }

    pub fn args(&self) -> &[i32] {
        &self.args
    }

    /// Argument `i`; callers have checked arity at construction.
    pub fn arg(&self, i: usize) -> Option<i32> {
        self.args.get(i).copied()
    }

    pub fn is(&self, opcode: Opcode) -> bool {
        self.opcode == opcode
    }

    // ==========================================================================
    // Typed constructors
    // ==========================================================================

    fn raw(opcode: Opcode, args: Vec<i32>) -> Self {
        Instruction { opcode, args }
    }

    /// An instruction without arguments. Only valid for `Fixed(0)` and
    /// variable-arity opcodes.
    pub fn simple(opcode: Opcode) -> Self {
        debug_assert!(matches!(
            opcode.prototype().arity,
            Arity::Fixed(0) | Arity::Variable
        ));
        Self::raw(opcode, Vec::new())
    }

    pub fn nop(marker: i32) -> Self {
        Self::raw(Opcode::Nop, vec![marker])
    }

    pub fn push_int(value: i32) -> Self {
        Self::raw(Opcode::PushInt, vec![value])
    }

    pub fn label(id: i32) -> Self {
        Self::raw(Opcode::Label, vec![id])
    }

    pub fn jump(label: i32) -> Self {
        Self::raw(Opcode::Jump, vec![label])
    }

    pub fn jump_if(label: i32) -> Self {
        Self::raw(Opcode::JumpIf, vec![label])
    }

    pub fn invoke(function: i32) -> Self {
        Self::raw(Opcode::Invoke, vec![function])
    }

    pub fn fsm_begin(case_count: i32) -> Self {
        Self::raw(Opcode::FsmBegin, vec![case_count])
    }

    pub fn fsm_jmp(target: i32) -> Self {
        Self::raw(Opcode::FsmJmp, vec![target])
    }

    pub fn fsm_if(on_true: i32, on_false: i32) -> Self {
        Self::raw(Opcode::FsmIf, vec![on_true, on_false])
    }

    pub fn fsm_call(target: i32) -> Self {
        Self::raw(Opcode::FsmCall, vec![target])
    }

    pub fn read_local(layout: &[DataType]) -> Self {
        Self::raw(Opcode::ReadLocal, layout_args(layout))
    }

    pub fn write_local(layout: &[DataType]) -> Self {
        Self::raw(Opcode::WriteLocal, layout_args(layout))
    }

    pub fn clear_local(layout: &[DataType]) -> Self {
        Self::raw(Opcode::ClearLocal, layout_args(layout))
    }
}

fn layout_args(layout: &[DataType]) -> Vec<i32> {
    layout.iter().map(|t| t.id()).collect()
}

// =============================================================================
// Text format: name[arg1,arg2,...]
// =============================================================================

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.opcode.name())?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", a)?;
        }
        f.write_str("]")
    }
}

impl FromStr for Instruction {
    type Err = InstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (name, rest) = text
            .split_once('[')
            .ok_or_else(|| InstructionError::Syntax(text.to_string()))?;
        let inner = rest
            .strip_suffix(']')
            .ok_or_else(|| InstructionError::Syntax(text.to_string()))?;

        let name = name.trim();
        let opcode = Opcode::from_name(name)
            .ok_or_else(|| InstructionError::UnknownInstruction(name.to_string()))?;

        let mut args = Vec::new();
        if !inner.trim().is_empty() {
            for arg in inner.split(',') {
                let arg = arg.trim();
                let value = arg.parse::<i32>().map_err(|_| InstructionError::Argument {
                    arg: arg.to_string(),
                    text: text.to_string(),
                })?;
                args.push(value);
            }
        }

        Instruction::new(opcode, args)
    }
}

/// Parses a listing of instructions separated by `;` or newlines.
pub fn parse_listing(text: &str) -> Result<Vec<Instruction>, InstructionError> {
    text.split([';', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Formats instructions as `[a, b, c]`, mostly for assertion messages.
pub fn listing_to_string(insns: &[Instruction]) -> String {
    let parts: Vec<String> = insns.iter().map(|i| i.to_string()).collect();
    format!("[{}]", parts.join(", "))
}
