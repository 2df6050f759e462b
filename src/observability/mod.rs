//! Observability subsystem for docflow
//!
//! - Structured logging through `tracing`, one event name per lifecycle step
//! - Counter metrics shared across executions
//!
//! # Usage
//!
//! ```ignore
//! use docflow::observability::{init_logging, Event, LogConfig, MetricsRegistry};
//!
//! init_logging(&LogConfig::default());
//! tracing::info!(event = %Event::Serving, addr = "0.0.0.0:8080", "serving");
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_pauses();
//! ```

mod events;
mod metrics;

pub use events::Event;
pub use metrics::{MetricsRegistry, MetricsSnapshot};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `docflow=debug,tower_http=info`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Emit one JSON object per line instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

/// Install the global tracing subscriber.
///
/// Returns false if a subscriber was already installed, which leaves the
/// existing one in place.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}
