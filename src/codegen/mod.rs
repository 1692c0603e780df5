//! # Tape code generation
//!
//! Turns fsm-form IR into tape code. [`writer::CodeWriter`] holds the
//! instruction templates; [`fsm::case_offset`] computes the dispatch values
//! the state-machine instructions push.

pub mod fsm;
pub mod writer;

pub use writer::{CodeWriter, CodegenConfig, CodegenError, generate};
