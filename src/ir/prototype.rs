use serde::{Deserialize, Serialize};

use crate::lang::data_type::DataType;

// =============================================================================
// OPCODES - every instruction the passes and the code writer understand
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // markers
    Nop,
    Breakpoint,

    // I/O
    PrintInt,
    ReadChar,
    PrintChar,

    // stack ops
    PushInt,
    PopInt,
    DupInt,
    SwapInt,

    // arithmetic
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Greater,

    // structured if, used to synthesize fsmIf
    IfElseBegin,
    IfElseElse,
    IfElseEnd,

    // ==========================================================================
    // Finite state machine, produced by the jumps-to-fsm pass
    // ==========================================================================
    FsmBegin,
    FsmEnd,
    FsmCase,
    FsmJmp,
    FsmIf,
    FsmCall,
    FsmReturn,

    // ==========================================================================
    // Control flow, consumed by the passes and never seen by the code writer
    // ==========================================================================
    Jump,
    JumpIf,
    Label,
    Invoke,
    Return,

    // locals, the arguments are the heap layout up to the addressed slot
    ReadLocal,
    WriteLocal,
    ClearLocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    /// Depends on the active heap layout or on the use as a marker.
    Variable,
}

/// Static description of an opcode.
///
/// `inputs`/`outputs` list the typed stack effect, top of stack last.
/// `None` means the effect depends on the call target.
#[derive(Debug)]
pub struct InstructionPrototype {
    pub opcode: Opcode,
    pub name: &'static str,
    pub arity: Arity,
    pub inputs: Option<&'static [DataType]>,
    pub outputs: Option<&'static [DataType]>,
}

impl InstructionPrototype {
    /// Returns (pops, pushes), or None if the effect is not statically known.
    pub fn stack_effect(&self) -> Option<(usize, usize)> {
        Some((self.inputs?.len(), self.outputs?.len()))
    }
}

const NONE: &[DataType] = &[];
const INT: &[DataType] = &[DataType::Int];
const INT_INT: &[DataType] = &[DataType::Int, DataType::Int];
const LBOOL: &[DataType] = &[DataType::LaxBool];
const BOOL: &[DataType] = &[DataType::Bool];
const FSM: &[DataType] = &[DataType::Fsm];

macro_rules! proto {
    ($op:ident, $name:literal, $arity:expr, $inputs:expr, $outputs:expr) => {
        InstructionPrototype {
            opcode: Opcode::$op,
            name: $name,
            arity: $arity,
            inputs: $inputs,
            outputs: $outputs,
        }
    };
}

use Arity::{Fixed, Variable};

/// The prototype table, in `Opcode` declaration order.
static PROTOTYPES: [InstructionPrototype; 33] = [
    proto!(Nop, "nop", Variable, Some(NONE), Some(NONE)),
    proto!(Breakpoint, "breakpoint", Fixed(0), Some(NONE), Some(NONE)),
    proto!(PrintInt, "printInt", Fixed(0), Some(INT), Some(INT)),
    proto!(ReadChar, "readChar", Fixed(0), Some(NONE), Some(INT)),
    proto!(PrintChar, "printChar", Fixed(0), Some(INT), Some(INT)),
    proto!(PushInt, "pushInt", Fixed(1), Some(NONE), Some(INT)),
    proto!(PopInt, "popInt", Fixed(0), Some(INT), Some(NONE)),
    proto!(DupInt, "dupInt", Fixed(0), Some(INT), Some(INT_INT)),
    proto!(SwapInt, "swapInt", Fixed(0), Some(INT_INT), Some(INT_INT)),
    proto!(Not, "not", Fixed(0), Some(LBOOL), Some(BOOL)),
    proto!(Add, "add", Fixed(0), Some(INT_INT), Some(INT)),
    proto!(Sub, "sub", Fixed(0), Some(INT_INT), Some(INT)),
    proto!(Mul, "mul", Fixed(0), Some(INT_INT), Some(INT)),
    proto!(Div, "div", Fixed(0), Some(INT_INT), Some(INT)),
    proto!(Greater, "greater", Fixed(0), Some(INT_INT), Some(INT)),
    proto!(IfElseBegin, "ifElseBegin", Fixed(0), Some(INT), Some(NONE)),
    proto!(IfElseElse, "ifElseElse", Fixed(0), Some(NONE), Some(NONE)),
    proto!(IfElseEnd, "ifElseEnd", Fixed(0), Some(NONE), Some(NONE)),
    proto!(FsmBegin, "fsmBegin", Fixed(1), Some(NONE), Some(INT)),
    proto!(FsmEnd, "fsmEnd", Fixed(0), Some(FSM), Some(NONE)),
    proto!(FsmCase, "fsmCase", Fixed(0), Some(FSM), Some(NONE)),
    proto!(FsmJmp, "fsmJmp", Fixed(1), Some(NONE), Some(FSM)),
    proto!(FsmIf, "fsmIf", Fixed(2), Some(LBOOL), Some(FSM)),
    proto!(FsmCall, "fsmCall", Fixed(1), None, Some(FSM)),
    proto!(FsmReturn, "fsmReturn", Fixed(0), Some(FSM), Some(FSM)),
    proto!(Jump, "jump", Fixed(1), Some(NONE), Some(NONE)),
    proto!(JumpIf, "jumpIf", Fixed(1), Some(LBOOL), Some(NONE)),
    proto!(Label, "label", Fixed(1), Some(NONE), Some(NONE)),
    proto!(Invoke, "invoke", Fixed(1), None, None),
    proto!(Return, "return", Fixed(0), Some(NONE), Some(NONE)),
    proto!(ReadLocal, "readLocal", Variable, Some(NONE), Some(INT)),
    proto!(WriteLocal, "writeLocal", Variable, Some(INT), Some(NONE)),
    proto!(ClearLocal, "clearLocal", Variable, Some(NONE), Some(NONE)),
];

impl Opcode {
    pub fn prototype(self) -> &'static InstructionPrototype {
        &PROTOTYPES[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.prototype().name
    }

    pub fn from_name(name: &str) -> Option<Opcode> {
        PROTOTYPES.iter().find(|p| p.name == name).map(|p| p.opcode)
    }

    /// Control transfers end a basic block in the jumps-to-fsm pass.
    pub fn is_control_transfer(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::JumpIf | Opcode::Invoke | Opcode::Return
        )
    }

    pub fn all() -> impl Iterator<Item = Opcode> {
        PROTOTYPES.iter().map(|p| p.opcode)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
