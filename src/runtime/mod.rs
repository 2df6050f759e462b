//! # Execution Runtime
//!
//! Pinned execution contexts for query executions.

mod errors;
mod pool;

pub use errors::{RuntimeError, RuntimeResult};
pub use pool::ContextPool;
