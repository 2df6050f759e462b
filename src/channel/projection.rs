//! # Projections
//!
//! A projection upserts each event of one channel into one binder, keyed by a
//! field of the event payload. Events without the key field are skipped.

use std::sync::Arc;

use serde_json::Value;

use crate::binder::Binder;

use super::errors::{ChannelError, ChannelResult};
use super::log::ChannelEvent;

/// Materializes channel events as binder documents
#[derive(Debug, Clone)]
pub struct Projection {
    name: String,
    channel: String,
    binder: Arc<dyn Binder>,
    id_field: String,
}

impl Projection {
    /// Create a projection from `channel` into `binder`
    pub fn new(
        name: impl Into<String>,
        channel: impl Into<String>,
        binder: Arc<dyn Binder>,
        id_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            channel: channel.into(),
            binder,
            id_field: id_field.into(),
        }
    }

    /// Projection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source channel
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Target binder
    pub fn binder(&self) -> &Arc<dyn Binder> {
        &self.binder
    }

    /// Payload field holding the document id
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Apply one event. Returns whether a document was written.
    pub fn apply(&self, event: &ChannelEvent) -> ChannelResult<bool> {
        let id = match event.payload.get(&self.id_field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Ok(false),
        };
        self.binder
            .put(&id, event.payload.clone())
            .map_err(|source| ChannelError::Projection {
                projection: self.name.clone(),
                source,
            })?;
        Ok(true)
    }
}
