//! CLI command implementations
//!
//! `serve` and `check` share one boot path: load the config, assemble the
//! platform, expose every declared route. `check` stops there.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::args::Command;
use super::errors::{CliError, CliResult};
use crate::config::DocflowConfig;
use crate::observability::{init_logging, Event};
use crate::platform::Platform;
use crate::rest_api::RestServiceAdaptor;
use crate::runtime::ContextPool;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, port } => serve(&config, port),
        Command::Check { config } => {
            let summary = check(&config)?;
            let json = serde_json::to_string_pretty(&summary)
                .map_err(|e| CliError::config_error(e.to_string()))?;
            println!("{json}");
            Ok(())
        }
    }
}

/// What a config assembles into
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub channels: Vec<String>,
    pub binders: Vec<String>,
    pub projections: Vec<String>,
    pub queries: Vec<String>,
    pub commands: Vec<String>,
    /// `METHOD uri` per exposed route
    pub routes: Vec<String>,
}

struct Booted {
    platform: Platform,
    pool: Arc<ContextPool>,
    adaptor: RestServiceAdaptor,
}

fn boot(config: &DocflowConfig, workers: usize) -> CliResult<Booted> {
    let platform = Platform::from_config(config)?;
    let pool = Arc::new(ContextPool::new(workers)?);
    let adaptor = RestServiceAdaptor::from_config(&platform, config, Arc::clone(&pool))?;
    Ok(Booted {
        platform,
        pool,
        adaptor,
    })
}

/// Validate a config and register everything it declares
pub fn check(config_path: &Path) -> CliResult<CheckSummary> {
    let config = DocflowConfig::load(config_path)?;
    let booted = boot(&config, 1)?;

    let summary = CheckSummary {
        channels: booted.platform.list_channels(),
        binders: booted.platform.list_binders(),
        projections: booted.platform.list_projections(),
        queries: booted.platform.cqrs().list_queries(),
        commands: booted.platform.cqrs().list_commands(),
        routes: booted
            .adaptor
            .routes()
            .into_iter()
            .map(|(method, uri)| format!("{method} {uri}"))
            .collect(),
    };
    drop(booted.adaptor);
    if let Ok(pool) = Arc::try_unwrap(booted.pool) {
        pool.shutdown();
    }
    Ok(summary)
}

/// Serve until interrupted
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let mut config = DocflowConfig::load(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    init_logging(&config.log);
    tracing::info!(
        event = %Event::ServerStart,
        config = %config_path.display(),
        workers = config.workers,
        "starting docflow"
    );

    let booted = boot(&config, config.workers)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        booted.adaptor.serve(shutdown_signal()).await
    })?;

    if let Ok(pool) = Arc::try_unwrap(booted.pool) {
        pool.shutdown();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!(event = %Event::ShutdownStart, "shutdown requested");
}
