//! # Command/Query Dispatch
//!
//! Adaptors resolve queries and invoke commands by name through
//! [`CqrsManager`]. Query definitions are immutable once registered and are
//! shared by every execution over them.

mod command;
mod errors;
mod manager;

pub use command::CommandHandler;
pub use errors::{CqrsError, CqrsResult};
pub use manager::CqrsManager;
