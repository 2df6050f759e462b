//! # Runtime Errors

use thiserror::Error;

/// Result type for context pool operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Context pool errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Context pool needs at least one worker")]
    NoWorkers,

    #[error("Failed to start execution context: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Execution context {0} has shut down")]
    ContextGone(usize),
}
