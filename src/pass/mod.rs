//! # IR passes
//!
//! Each pass maps a flat instruction stream to a fresh one. The driver runs
//! [`insert_methods::InsertMethodsPass`] first, which turns the function table
//! into labelled blocks, then [`jumps_to_fsm::JumpsToFsmPass`], which replaces
//! every label and jump with the `fsm*` dispatch instructions the code writer
//! understands.

pub mod insert_methods;
pub mod jumps_to_fsm;

use thiserror::Error;

use crate::codegen::fsm::FsmOffsetError;
use crate::ir::instruction::Instruction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    #[error("pass error: invoke of unknown function {0}")]
    UnknownFunction(i32),

    #[error("pass error: jump to unknown label {0}")]
    UnknownLabel(i32),

    #[error("pass error: {0}")]
    FsmOffset(#[from] FsmOffsetError),
}

pub trait CompilerPass {
    fn name(&self) -> &'static str;

    fn run(&self, insns: &[Instruction]) -> Result<Vec<Instruction>, PassError>;
}
