//! Server and flow-control settings.

use serde::{Deserialize, Serialize};

use crate::query::{Watermarks, DEFAULT_HIGH_WATERMARK, DEFAULT_PUMP_BATCH};

use super::errors::{ConfigError, ConfigResult};

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Backpressure settings for streamed query responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowControlConfig {
    /// Unacknowledged bytes above which the cursor pauses (default: 4 MiB)
    #[serde(default = "default_high_watermark")]
    pub high_watermark_bytes: u64,

    /// Unacknowledged bytes below which the cursor resumes (default: half the high watermark)
    #[serde(default)]
    pub low_watermark_bytes: Option<u64>,

    /// Chunks the transport queue holds before writes count as queue-full (default: 64)
    #[serde(default = "default_write_queue_chunks")]
    pub write_queue_chunks: usize,

    /// Documents pulled per scheduling turn (default: 64)
    #[serde(default = "default_pump_batch")]
    pub pump_batch: usize,
}

fn default_high_watermark() -> u64 {
    DEFAULT_HIGH_WATERMARK
}

fn default_write_queue_chunks() -> usize {
    64
}

fn default_pump_batch() -> usize {
    DEFAULT_PUMP_BATCH
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        Self {
            high_watermark_bytes: default_high_watermark(),
            low_watermark_bytes: None,
            write_queue_chunks: default_write_queue_chunks(),
            pump_batch: default_pump_batch(),
        }
    }
}

impl FlowControlConfig {
    /// Resolve the watermark pair
    pub fn watermarks(&self) -> ConfigResult<Watermarks> {
        let marks = match self.low_watermark_bytes {
            Some(low) => Watermarks::new(self.high_watermark_bytes, low),
            None => Watermarks::with_high(self.high_watermark_bytes),
        };
        marks.map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check every setting
    pub fn validate(&self) -> ConfigResult<()> {
        self.watermarks()?;
        if self.write_queue_chunks == 0 {
            return Err(ConfigError::Invalid(
                "flow_control.write_queue_chunks must be at least 1".into(),
            ));
        }
        if self.pump_batch == 0 {
            return Err(ConfigError::Invalid(
                "flow_control.pump_batch must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
