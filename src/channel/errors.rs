//! # Channel Errors

use thiserror::Error;

use crate::binder::BinderError;

/// Result type for channel and projection operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel and projection errors
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("No such channel: {0}")]
    NotFound(String),

    #[error("Channel already exists: {0}")]
    AlreadyExists(String),

    #[error("No such projection: {0}")]
    ProjectionNotFound(String),

    #[error("Projection already exists: {0}")]
    ProjectionExists(String),

    #[error("Projection {projection} failed: {source}")]
    Projection {
        projection: String,
        #[source]
        source: BinderError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
