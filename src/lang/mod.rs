//! # Language model
//!
//! Value types, the parsed syntax tree, lexical scopes and the resolved tree.
//!
//! ## Documentation conventions
//!
//! - Stack effects are written as `( before -- after )`, top of stack last.
//! - Heap layouts list slot types from slot 0 up to the addressed slot.

pub mod data_type;
pub mod node;
pub mod scope;
pub mod typed;
