use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ir::instruction::{Instruction, InstructionError};

#[derive(Debug, Error)]
pub enum ProgramIrError {
    #[error("cannot encode program: {0}")]
    Encode(postcard::Error),

    #[error("cannot decode program: {0}")]
    Decode(postcard::Error),

    #[error("invalid instruction in program: {0}")]
    Invalid(#[from] InstructionError),
}

/// The front end's output: the main stream plus the function table.
///
/// Convention: `functions` is keyed by the function's label id, and
/// `next_label` is the first label id nobody has handed out yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramIr {
    pub main: Vec<Instruction>,
    pub functions: BTreeMap<i32, Vec<Instruction>>,
    pub next_label: i32,
}

impl ProgramIr {
    pub fn new(main: Vec<Instruction>) -> Self {
        Self {
            main,
            functions: BTreeMap::new(),
            next_label: 0,
        }
    }

    pub fn instruction_count(&self) -> usize {
        self.main.len() + self.functions.values().map(Vec::len).sum::<usize>()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProgramIrError> {
        postcard::to_allocvec(self).map_err(ProgramIrError::Encode)
    }

    /// Decodes a program and re-checks every instruction's arity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProgramIrError> {
        let program: ProgramIr = postcard::from_bytes(bytes).map_err(ProgramIrError::Decode)?;
        program
            .main
            .iter()
            .chain(program.functions.values().flatten())
            .try_for_each(Instruction::validate)?;
        Ok(program)
    }
}
