use thiserror::Error;

use crate::lang::data_type::DataType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A value type the lowering has no instructions for.
    #[error("compile error: cannot lower a value of type {ty} in {context}")]
    UnsupportedType { ty: DataType, context: &'static str },

    /// Internal compiler error (shouldn't happen for resolved input)
    #[error("compile error: internal error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn unsupported(ty: DataType, context: &'static str) -> Self {
        CompileError::UnsupportedType { ty, context }
    }

    /// Create an internal compiler error
    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            CompileError::unsupported(DataType::String, "a variable read").to_string(),
            "compile error: cannot lower a value of type string in a variable read"
        );
        assert_eq!(
            CompileError::internal("boom").to_string(),
            "compile error: internal error: boom"
        );
    }
}
