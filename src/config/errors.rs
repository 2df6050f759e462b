//! # Configuration Errors

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "DOCFLOW_CONFIG_READ",
            ConfigError::Parse(_) => "DOCFLOW_CONFIG_PARSE",
            ConfigError::Invalid(_) => "DOCFLOW_CONFIG_INVALID",
        }
    }
}
