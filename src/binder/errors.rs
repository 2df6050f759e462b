//! # Binder Errors

use thiserror::Error;

/// Result type for binder operations
pub type BinderResult<T> = Result<T, BinderError>;

/// Binder errors
#[derive(Debug, Clone, Error)]
pub enum BinderError {
    /// No binder registered under this name
    #[error("No such binder: {0}")]
    NotFound(String),

    /// A binder with this name already exists
    #[error("Binder already exists: {0}")]
    AlreadyExists(String),

    /// A read against the store failed
    #[error("Lookup failed: {0}")]
    LookupFailed(String),

    /// The payload is not a JSON object
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
