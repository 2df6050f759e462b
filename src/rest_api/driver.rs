//! # Query Stream Driver
//!
//! Runs one streamed query on a pinned execution context. The loop owns the
//! execution outright, so pumping documents, feeding acks back and closing
//! all happen on that one context:
//!
//! ```text
//! loop
//!   settle bytes the body has pulled
//!   select (biased)
//!     client gone            -> close, stop
//!     backlog + free slot    -> send one backlogged chunk
//!     running                -> pump one batch
//!     body pulled a chunk    -> loop
//! until closed and backlog drained
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::http::header;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc::Sender;

use crate::binder::Document;
use crate::config::{ConfigError, ConfigResult, FlowControlConfig};
use crate::observability::{Event, MetricsRegistry};
use crate::query::{QueryDefinition, QueryError, QueryExecution, QueryResult, Watermarks};
use crate::runtime::ContextPool;

use super::sink::{chunk_queue, ChunkedResponseSink, Frame};

/// Flow-control settings applied to every streamed query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Pause and resume thresholds on unacknowledged bytes
    watermarks: Watermarks,
    /// Capacity of the body queue, in chunks
    write_queue_chunks: usize,
    /// Documents pulled from the cursor per scheduling turn
    pump_batch: usize,
}

impl StreamSettings {
    /// Build settings. The queue capacity and the pump batch must be non-zero.
    pub fn new(
        watermarks: Watermarks,
        write_queue_chunks: usize,
        pump_batch: usize,
    ) -> ConfigResult<Self> {
        if write_queue_chunks == 0 {
            return Err(ConfigError::Invalid(
                "write queue must hold at least 1 chunk".into(),
            ));
        }
        if pump_batch == 0 {
            return Err(ConfigError::Invalid(
                "pump batch must be at least 1 document".into(),
            ));
        }
        Ok(Self {
            watermarks,
            write_queue_chunks,
            pump_batch,
        })
    }

    /// Resolve settings from the flow-control config
    pub fn from_config(config: &FlowControlConfig) -> ConfigResult<Self> {
        config.validate()?;
        Self::new(
            config.watermarks()?,
            config.write_queue_chunks,
            config.pump_batch,
        )
    }

    pub fn watermarks(&self) -> Watermarks {
        self.watermarks
    }

    pub fn write_queue_chunks(&self) -> usize {
        self.write_queue_chunks
    }

    pub fn pump_batch(&self) -> usize {
        self.pump_batch
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        let config = FlowControlConfig::default();
        Self {
            watermarks: Watermarks::default(),
            write_queue_chunks: config.write_queue_chunks,
            pump_batch: config.pump_batch,
        }
    }
}

/// Start streaming `query` on the pool and return the chunked response
pub(crate) fn stream_query(
    pool: &ContextPool,
    query: Arc<QueryDefinition>,
    params: Document,
    settings: StreamSettings,
    metrics: Arc<MetricsRegistry>,
) -> Response {
    let (sink, body) = chunk_queue(settings.write_queue_chunks);
    let name = query.name().to_string();

    let spawned = pool.spawn_pinned(move || drive(query, params, sink, settings, metrics));
    if let Err(e) = spawned {
        tracing::error!(query = %name, error = %e, "no execution context available");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(body),
    )
        .into_response()
}

async fn drive(
    query: Arc<QueryDefinition>,
    params: Document,
    sink: ChunkedResponseSink,
    settings: StreamSettings,
    metrics: Arc<MetricsRegistry>,
) {
    let tx = sink.sender().clone();
    let mut execution = QueryExecution::new(query, params, sink, settings.watermarks)
        .with_metrics(Arc::clone(&metrics));

    if let Err(e) = run(&mut execution, &tx, settings.pump_batch, &metrics).await {
        tracing::error!(
            execution_id = %execution.id(),
            query = execution.query().name(),
            code = e.code(),
            error = %e,
            "query stream aborted"
        );
        let _ = execution.close();
    }
}

async fn run(
    execution: &mut QueryExecution<ChunkedResponseSink>,
    tx: &Sender<Frame>,
    batch: usize,
    metrics: &MetricsRegistry,
) -> QueryResult<()> {
    let delivered = Arc::clone(execution.sink().delivered());
    execution.start()?;
    loop {
        let acked = execution.sink_mut().take_acked();
        if acked > 0 {
            execution.handle_ack(acked)?;
        }

        let backlog = execution.sink().has_backlog();
        if execution.is_closed() && !backlog {
            return Ok(());
        }
        let running = execution.is_running();

        tokio::select! {
            biased;
            _ = tx.closed() => {
                return execution.close();
            }
            permit = tx.reserve(), if backlog => match permit {
                Ok(permit) => execution.sink_mut().send_backlog(permit),
                Err(_) => return execution.close(),
            },
            _ = tokio::task::yield_now(), if running => {
                if let Err(e) = execution.pump(batch) {
                    report_pump_failure(execution, &e, metrics);
                    if e.is_fatal() {
                        return Err(e);
                    }
                }
            }
            _ = delivered.wait() => {}
        }
    }
}

/// The execution has already closed itself as failed; the sink aborts the body
fn report_pump_failure(
    execution: &QueryExecution<ChunkedResponseSink>,
    error: &QueryError,
    metrics: &MetricsRegistry,
) {
    if let QueryError::LookupFailure(_) = error {
        metrics.increment_lookups_failed();
        tracing::error!(
            event = %Event::LookupFailed,
            execution_id = %execution.id(),
            query = execution.query().name(),
            error = %error,
            "cursor read failed"
        );
    } else {
        tracing::warn!(
            event = %Event::ExecutionFailed,
            execution_id = %execution.id(),
            query = execution.query().name(),
            code = error.code(),
            error = %error,
            "query execution failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = FlowControlConfig {
            high_watermark_bytes: 1000,
            low_watermark_bytes: None,
            write_queue_chunks: 4,
            pump_batch: 8,
        };
        let settings = StreamSettings::from_config(&config).unwrap();
        assert_eq!(settings.watermarks().high(), 1000);
        assert_eq!(settings.watermarks().low(), 500);
        assert_eq!(settings.write_queue_chunks(), 4);
        assert_eq!(settings.pump_batch(), 8);
    }

    #[test]
    fn test_default_settings_match_config_defaults() {
        let from_config = StreamSettings::from_config(&FlowControlConfig::default()).unwrap();
        assert_eq!(from_config, StreamSettings::default());
    }

    #[test]
    fn test_zero_queue_or_batch_rejected() {
        let marks = Watermarks::with_high(1000).unwrap();
        assert!(matches!(
            StreamSettings::new(marks, 0, 8),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            StreamSettings::new(marks, 4, 0),
            Err(ConfigError::Invalid(_))
        ));

        let settings = StreamSettings::new(marks, 1, 1).unwrap();
        assert_eq!(settings.write_queue_chunks(), 1);
        assert_eq!(settings.pump_batch(), 1);
    }
}
