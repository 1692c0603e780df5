use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime error: unmatched '[' at offset {0}")]
    UnmatchedOpen(usize),

    #[error("runtime error: unmatched ']' at offset {0}")]
    UnmatchedClose(usize),

    #[error("runtime error: tape length must be positive")]
    EmptyTape,

    #[error("runtime error: execution step limit exceeded ({0})")]
    StepLimit(usize),

    #[error("runtime error: i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
