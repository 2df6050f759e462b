//! # Configuration
//!
//! docflow is configured from one JSON file. Every field has a default, so
//! `{}` is a valid config that serves an empty platform.
//!
//! ```json
//! {
//!   "server": { "port": 8080 },
//!   "flow_control": { "high_watermark_bytes": 4194304 },
//!   "channels": ["orders"],
//!   "binders": ["orders"],
//!   "projections": [{ "name": "orders-by-id", "channel": "orders", "binder": "orders" }],
//!   "queries": [{ "name": "all-orders", "binder": "orders" }],
//!   "commands": [{ "name": "place-order", "channel": "orders" }],
//!   "routes": [
//!     { "kind": "query", "query": "all-orders", "uri": "/orders" },
//!     { "kind": "command", "command": "place-order", "uri": "/orders" }
//!   ]
//! }
//! ```
//!
//! [`DocflowConfig::validate`] checks the config on its own. Whether the
//! declarations reference each other correctly is checked when the platform
//! is assembled from them.

mod declarations;
mod errors;
mod server;

pub use declarations::{CommandDecl, ProjectionDecl, QueryDecl, RouteDecl};
pub use errors::{ConfigError, ConfigResult};
pub use server::{FlowControlConfig, ServerConfig};

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::observability::LogConfig;

/// Top-level docflow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocflowConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub flow_control: FlowControlConfig,

    /// Pinned execution contexts (default: available parallelism)
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default)]
    pub binders: Vec<String>,

    #[serde(default)]
    pub projections: Vec<ProjectionDecl>,

    #[serde(default)]
    pub queries: Vec<QueryDecl>,

    #[serde(default)]
    pub commands: Vec<CommandDecl>,

    #[serde(default)]
    pub routes: Vec<RouteDecl>,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for DocflowConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            flow_control: FlowControlConfig::default(),
            workers: default_workers(),
            log: LogConfig::default(),
            channels: Vec::new(),
            binders: Vec::new(),
            projections: Vec::new(),
            queries: Vec::new(),
            commands: Vec::new(),
            routes: Vec::new(),
        }
    }
}

impl FromStr for DocflowConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        let config: DocflowConfig =
            serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl DocflowConfig {
    /// Read, parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        contents.parse()
    }

    /// Check settings and name uniqueness
    pub fn validate(&self) -> ConfigResult<()> {
        self.flow_control.validate()?;
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }

        unique("channel", self.channels.iter())?;
        unique("binder", self.binders.iter())?;
        unique("projection", self.projections.iter().map(|p| &p.name))?;
        unique("query", self.queries.iter().map(|q| &q.name))?;
        unique("command", self.commands.iter().map(|c| &c.name))?;

        for route in &self.routes {
            if !route.uri().starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "route uri must start with '/': {}",
                    route.uri()
                )));
            }
            if let RouteDecl::Command { method, .. } = route {
                parse_method(method)?;
            }
        }
        Ok(())
    }
}

/// Parse an HTTP method name, case-insensitively
pub fn parse_method(method: &str) -> ConfigResult<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigError::Invalid(format!("unknown HTTP method: {method}")))
}

fn unique<'a>(kind: &str, names: impl Iterator<Item = &'a String>) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::Invalid(format!("duplicate {kind}: {name}")));
        }
    }
    Ok(())
}
