//! Query engine error types
//!
//! Error codes:
//! - DOCFLOW_WRONG_CONTEXT (FATAL)
//! - DOCFLOW_NOT_STARTED (ERROR)
//! - DOCFLOW_HANDLER_FAILURE (ERROR)
//! - DOCFLOW_LOOKUP_FAILURE (ERROR)
//! - DOCFLOW_ACK_OVERFLOW (ERROR)
//! - DOCFLOW_INVALID_WATERMARKS (ERROR)

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use super::affinity::ContextId;

/// Severity levels for query errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The execution failed; other executions are unaffected
    Error,
    /// Programmer error; the execution must be aborted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Result type for query engine operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Query engine errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// An operation was invoked off the execution's latched context
    #[error("Wrong context: execution is bound to {expected}, called from {actual}")]
    WrongContext {
        /// The latched context
        expected: ContextId,
        /// The calling context
        actual: ContextId,
    },

    /// A document arrived before the execution was started
    #[error("Execution {0} has not been started")]
    NotStarted(Uuid),

    /// The query's document filter failed
    #[error("Query '{query}' failed: {reason}")]
    HandlerFailure {
        /// Query name
        query: String,
        /// Failure detail
        reason: String,
    },

    /// Reading from the document store failed
    #[error("Lookup failed: {0}")]
    LookupFailure(String),

    /// More bytes were acknowledged than were outstanding
    #[error("Acknowledged {acked} bytes but only {outstanding} are outstanding")]
    AckOverflow {
        /// Bytes in the rejected ack
        acked: u64,
        /// Bytes outstanding at the time
        outstanding: u64,
    },

    /// Watermark configuration is unusable
    #[error("Invalid watermarks: {0}")]
    InvalidWatermarks(String),
}

impl QueryError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::WrongContext { .. } => "DOCFLOW_WRONG_CONTEXT",
            QueryError::NotStarted(_) => "DOCFLOW_NOT_STARTED",
            QueryError::HandlerFailure { .. } => "DOCFLOW_HANDLER_FAILURE",
            QueryError::LookupFailure(_) => "DOCFLOW_LOOKUP_FAILURE",
            QueryError::AckOverflow { .. } => "DOCFLOW_ACK_OVERFLOW",
            QueryError::InvalidWatermarks(_) => "DOCFLOW_INVALID_WATERMARKS",
        }
    }

    /// Severity of this error
    pub fn severity(&self) -> Severity {
        match self {
            QueryError::WrongContext { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for document filter evaluation
pub type FilterResult<T> = Result<T, FilterError>;

/// Document filter failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// A predicate references a parameter the invocation did not bind
    #[error("Missing parameter: {0}")]
    MissingParam(String),

    /// A bound parameter cannot be read as the declared type
    #[error("Parameter '{param}' is not a valid {expected}")]
    ParamType {
        /// Parameter name
        param: String,
        /// Declared type
        expected: &'static str,
    },

    /// Filter-specific failure
    #[error("{0}")]
    Failed(String),
}
