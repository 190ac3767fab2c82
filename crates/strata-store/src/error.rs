use strata_types::DataType;

/// Errors from storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O failure in the underlying substrate, with the node/property
    /// context it occurred in. Never retried.
    #[error("i/o error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The addressed node does not exist.
    #[error("node not found: {path}")]
    NotFound { path: String },

    /// A required property is absent.
    #[error("missing property \"{name}\" at {node}")]
    AttrMissing { node: String, name: String },

    /// A property holds a different type than the caller expected.
    #[error("property \"{name}\" has type {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: DataType,
        actual: DataType,
    },

    /// The stored data is malformed or cannot be decoded.
    #[error("corrupt storage at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The node path is not a valid storage address.
    #[error("invalid path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: String },
}

impl StoreError {
    /// Wrap an I/O error with the node/property context it occurred in.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
