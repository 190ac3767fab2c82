use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity id: {0}")]
    InvalidId(String),

    #[error("invalid value length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
