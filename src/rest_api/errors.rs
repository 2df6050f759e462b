//! # REST Adaptor Errors
//!
//! Registration errors fail fast while routes are being exposed, before any
//! traffic is accepted. Request errors map to bare status codes: server-side
//! failure detail is logged, never sent to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::runtime::RuntimeError;

/// Result type for REST adaptor operations
pub type RestResult<T> = Result<T, RestError>;

/// REST adaptor errors
#[derive(Debug, Error)]
pub enum RestError {
    // ==================
    // Registration
    // ==================
    /// Route references an unregistered query
    #[error("No such query {0}")]
    QueryNotFound(String),

    /// Route references an unregistered command
    #[error("No such command {0}")]
    CommandNotFound(String),

    /// Route references an unknown binder
    #[error("No such binder {0}")]
    BinderNotFound(String),

    /// Route already exposed, or ambiguous with an exposed one
    #[error("Route conflict: {method} {uri}")]
    RouteConflict { method: String, uri: String },

    /// Malformed route
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    // ==================
    // Serving
    // ==================
    /// Listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Server loop failed
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    // ==================
    // Requests
    // ==================
    /// Request body is not a JSON object
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Nothing stored under the requested id
    #[error("Not found")]
    NotFound,

    /// Failure detail stays server-side
    #[error("Internal error")]
    Internal,
}

impl RestError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            RestError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body for client errors
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_client_error() && !matches!(self, RestError::NotFound) {
            let body = ErrorResponse {
                error: self.to_string(),
                code: status.as_u16(),
            };
            return (status, Json(body)).into_response();
        }
        status.into_response()
    }
}
