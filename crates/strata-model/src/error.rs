//! Error types for entity operations.

use thiserror::Error;

use strata_store::StoreError;

/// Errors that can occur in the entity mapping layer.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Failure in the underlying storage backend.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An entity id or index did not resolve at call time.
    #[error("{kind} not found: {what}")]
    NotFound { kind: &'static str, what: String },

    /// The operation was invoked on a handle whose storage location was
    /// never bound to an entity. The caller must create the entity first;
    /// retrying will not help.
    #[error("uninitialized entity at {path}")]
    UninitializedEntity { path: String },

    /// A stored entity id is not parseable.
    #[error("invalid entity id: {0}")]
    InvalidId(String),
}

impl ModelError {
    pub(crate) fn not_found(kind: &'static str, what: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            what: what.into(),
        }
    }
}

/// Result alias for entity operations.
pub type ModelResult<T> = Result<T, ModelError>;
