//! # REST Adaptor
//!
//! HTTP surface for the platform:
//!
//! - `GET {uri}` streams a query as a chunked JSON array, path parameters
//!   bound into the query context
//! - `{METHOD} {uri}` invokes a command with the request body
//! - `GET {uri}?id=...` returns one binder document
//!
//! Each streamed query runs on a pinned execution context from the
//! [`ContextPool`](crate::runtime::ContextPool), with backpressure driven by
//! how fast the client drains the response.

mod adaptor;
mod driver;
mod errors;
mod routes;
mod sink;

pub use adaptor::RestServiceAdaptor;
pub use driver::StreamSettings;
pub use errors::{ErrorResponse, RestError, RestResult};
pub use routes::{observability_routes, HealthResponse};
pub use sink::{chunk_queue, Chunk, ChunkedResponseSink, DeliveredBytes, Frame};
