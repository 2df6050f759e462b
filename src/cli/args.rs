//! CLI argument definitions using clap
//!
//! Commands:
//! - docflow serve --config <path> [--port <port>]
//! - docflow check --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docflow - event-sourced documents with flow-controlled query streaming
#[derive(Parser, Debug)]
#[command(name = "docflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Assemble the platform and serve its routes over HTTP
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./docflow.json")]
        config: PathBuf,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Load the config and register everything it declares, without serving
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./docflow.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_port() {
        let cli = Cli::try_parse_from(["docflow", "serve", "--config", "a.json", "--port", "9000"])
            .unwrap();
        match cli.command {
            Command::Serve { config, port } => {
                assert_eq!(config, PathBuf::from("a.json"));
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_check_default_config_path() {
        let cli = Cli::try_parse_from(["docflow", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Check { ref config } if config == &PathBuf::from("./docflow.json")
        ));
    }
}
