//! Errors surfaced by `docflow` subcommands.
//!
//! The process prints `CODE: message` to stderr and exits non-zero.

use std::fmt;

use crate::config::ConfigError;
use crate::platform::PlatformError;
use crate::rest_api::RestError;
use crate::runtime::RuntimeError;

/// Which stage of startup or serving failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// The config file is missing, malformed or invalid
    ConfigError,
    /// Declarations reference unknown names, or contexts would not start
    BootFailed,
    /// Binding or serving failed
    ServeFailed,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "DOCFLOW_CLI_CONFIG_ERROR",
            Self::BootFailed => "DOCFLOW_CLI_BOOT_FAILED",
            Self::ServeFailed => "DOCFLOW_CLI_SERVE_FAILED",
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    pub fn serve_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ServeFailed, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<PlatformError> for CliError {
    fn from(e: PlatformError) -> Self {
        match e {
            PlatformError::Config(e) => Self::config_error(e.to_string()),
            other => Self::boot_failed(other.to_string()),
        }
    }
}

impl From<RuntimeError> for CliError {
    fn from(e: RuntimeError) -> Self {
        Self::boot_failed(e.to_string())
    }
}

impl From<RestError> for CliError {
    fn from(e: RestError) -> Self {
        match e {
            RestError::Bind { .. } | RestError::Serve(_) => Self::serve_failed(e.to_string()),
            RestError::Config(e) => Self::config_error(e.to_string()),
            other => Self::boot_failed(other.to_string()),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
