//! `/health` and `/metrics`, served next to every exposed route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::observability::{MetricsRegistry, MetricsSnapshot};

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Executions opened and not yet closed
    pub open_executions: u64,
}

impl HealthResponse {
    fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        let closed = snapshot.executions_completed
            + snapshot.executions_cancelled
            + snapshot.executions_failed;
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            open_executions: snapshot.executions_opened.saturating_sub(closed),
        }
    }
}

pub fn observability_routes(metrics: Arc<MetricsRegistry>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_snapshot))
        .with_state(metrics)
}

async fn health(State(metrics): State<Arc<MetricsRegistry>>) -> Json<HealthResponse> {
    Json(HealthResponse::from_snapshot(&metrics.snapshot()))
}

async fn metrics_snapshot(State(metrics): State<Arc<MetricsRegistry>>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}
