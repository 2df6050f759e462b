//! # Channel Registry
//!
//! Owns every channel and projection. Publishing appends to the channel and
//! then applies each projection subscribed to it, in registration order,
//! before returning.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::binder::Document;
use crate::observability::Event;

use super::errors::{ChannelError, ChannelResult};
use super::log::{ChannelEvent, ChannelLog};
use super::projection::Projection;

/// Channels and the projections fed from them
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: RwLock<BTreeMap<String, Arc<ChannelLog>>>,
    projections: RwLock<Vec<Arc<Projection>>>,
}

impl ChannelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel
    pub fn create_channel(&self, name: &str) -> ChannelResult<Arc<ChannelLog>> {
        let mut channels = self
            .channels
            .write()
            .map_err(|_| ChannelError::Internal("Lock poisoned".into()))?;
        if channels.contains_key(name) {
            return Err(ChannelError::AlreadyExists(name.to_string()));
        }
        let log = Arc::new(ChannelLog::new(name));
        channels.insert(name.to_string(), Arc::clone(&log));
        Ok(log)
    }

    /// Get a channel by name
    pub fn channel(&self, name: &str) -> ChannelResult<Arc<ChannelLog>> {
        let channels = self
            .channels
            .read()
            .map_err(|_| ChannelError::Internal("Lock poisoned".into()))?;
        channels
            .get(name)
            .cloned()
            .ok_or_else(|| ChannelError::NotFound(name.to_string()))
    }

    /// Names of all channels, sorted
    pub fn list_channels(&self) -> Vec<String> {
        self.channels
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Add a projection and replay the channel's existing events into it.
    ///
    /// The projection is registered only once the replay succeeds. Publishing
    /// is held off for the duration, so the replay sees every event appended
    /// before registration and nothing appended after it.
    pub fn add_projection(&self, projection: Projection) -> ChannelResult<Arc<Projection>> {
        let log = self.channel(projection.channel())?;
        let mut projections = self
            .projections
            .write()
            .map_err(|_| ChannelError::Internal("Lock poisoned".into()))?;
        if projections.iter().any(|p| p.name() == projection.name()) {
            return Err(ChannelError::ProjectionExists(projection.name().to_string()));
        }

        for event in log.read_from(1)? {
            projection.apply(&event)?;
        }
        let projection = Arc::new(projection);
        projections.push(Arc::clone(&projection));
        Ok(projection)
    }

    /// Get a projection by name
    pub fn projection(&self, name: &str) -> ChannelResult<Arc<Projection>> {
        let projections = self
            .projections
            .read()
            .map_err(|_| ChannelError::Internal("Lock poisoned".into()))?;
        projections
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| ChannelError::ProjectionNotFound(name.to_string()))
    }

    /// Names of all projections, in registration order
    pub fn list_projections(&self) -> Vec<String> {
        self.projections
            .read()
            .map(|p| p.iter().map(|p| p.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Append to a channel and run its projections.
    ///
    /// The event stays appended even if a projection fails; the failure is
    /// logged and the remaining projections still run. The append and the
    /// fan-out happen under the projection list's read lock, so a projection
    /// being added never misses or replays over a concurrent event.
    pub fn publish(&self, channel: &str, payload: Document) -> ChannelResult<ChannelEvent> {
        let log = self.channel(channel)?;
        let projections = self
            .projections
            .read()
            .map_err(|_| ChannelError::Internal("Lock poisoned".into()))?;

        let event = log.append(payload)?;
        tracing::debug!(
            event = %Event::EventPublished,
            channel,
            sequence = event.sequence,
            "event published"
        );

        let subscribed = projections.iter().filter(|p| p.channel() == channel);
        for projection in subscribed {
            if let Err(e) = projection.apply(&event) {
                tracing::warn!(
                    event = %Event::ProjectionFailed,
                    projection = projection.name(),
                    sequence = event.sequence,
                    error = %e,
                    "projection failed"
                );
            }
        }
        Ok(event)
    }
}
