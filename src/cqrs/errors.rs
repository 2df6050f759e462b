//! # Dispatch Errors

use thiserror::Error;

/// Result type for command and query dispatch
pub type CqrsResult<T> = Result<T, CqrsError>;

/// Command and query dispatch errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CqrsError {
    #[error("No such query: {0}")]
    QueryNotFound(String),

    #[error("No such command: {0}")]
    CommandNotFound(String),

    #[error("{kind} already registered: {name}")]
    AlreadyRegistered { kind: &'static str, name: String },

    #[error("Command {command} failed: {reason}")]
    HandlerFailure { command: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CqrsError {
    /// Shorthand for a failed command handler
    pub fn handler_failure(command: impl Into<String>, reason: impl ToString) -> Self {
        CqrsError::HandlerFailure {
            command: command.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure names something that was never registered
    pub fn is_not_found(&self) -> bool {
        matches!(self, CqrsError::QueryNotFound(_) | CqrsError::CommandNotFound(_))
    }
}
