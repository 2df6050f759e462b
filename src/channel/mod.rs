//! # Channels
//!
//! Append-only event channels and the projections that materialize their
//! events into binders. Projections run synchronously on publish, so a
//! document is queryable as soon as `publish` returns.

mod errors;
mod log;
mod projection;
mod registry;

pub use errors::{ChannelError, ChannelResult};
pub use log::{ChannelEvent, ChannelLog};
pub use projection::Projection;
pub use registry::ChannelRegistry;
