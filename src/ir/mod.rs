pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod instruction;
pub mod program;
pub mod prototype;
pub mod stack_check;

pub use instruction::Instruction;
pub use program::ProgramIr;
pub use prototype::Opcode;
