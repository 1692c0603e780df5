pub mod runtime_error;
pub mod tape_dump;
pub mod tape_vm;

pub use runtime_error::RuntimeError;
pub use tape_vm::{EofBehavior, StepResult, TapeVm, TapeVmConfig, run_program};
