//! CLI module for docflow
//!
//! Provides command-line interface for:
//! - serve: Assemble the platform and serve HTTP
//! - check: Validate a config by assembling it, without serving

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check, run, run_command, serve, CheckSummary};
pub use errors::{CliError, CliErrorCode, CliResult};
