//! # Platform Errors

use thiserror::Error;

use crate::binder::BinderError;
use crate::channel::ChannelError;
use crate::config::ConfigError;
use crate::cqrs::CqrsError;

/// Result type for platform assembly and admin operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Platform errors
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error(transparent)]
    Binder(#[from] BinderError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Cqrs(#[from] CqrsError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
