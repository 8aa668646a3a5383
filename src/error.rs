use thiserror::Error;

/// Failures of the evaluation core. All of them are terminal for the call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    /// Malformed, mismatched or empty inputs.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Not enough identities or images to build the requested pairs.
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    /// Embeddings of different lengths were compared.
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

impl EvalError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
