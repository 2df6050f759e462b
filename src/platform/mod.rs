//! # Platform
//!
//! The platform owns every binder, channel, projection, query and command,
//! plus the metrics they report into. It is assembled from a
//! [`DocflowConfig`] or built up through the admin operations below.
//!
//! Assembly order follows dependencies: channels and binders first, then
//! projections between them, then queries over binders and commands that
//! publish to channels. An unknown name anywhere fails assembly.

mod errors;

pub use errors::{PlatformError, PlatformResult};

use std::sync::Arc;

use crate::binder::{Binder, BinderRegistry, Document};
use crate::channel::{ChannelEvent, ChannelRegistry, Projection};
use crate::config::{CommandDecl, DocflowConfig, ProjectionDecl, QueryDecl};
use crate::cqrs::{CqrsError, CqrsManager};
use crate::observability::{Event, MetricsRegistry};
use crate::query::{PredicateFilter, QueryContext, QueryDefinition};

/// Binders, channels and dispatch for one process
#[derive(Debug, Default)]
pub struct Platform {
    binders: Arc<BinderRegistry>,
    channels: Arc<ChannelRegistry>,
    cqrs: Arc<CqrsManager>,
    metrics: Arc<MetricsRegistry>,
}

impl Platform {
    /// Create an empty platform
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble everything the config declares
    pub fn from_config(config: &DocflowConfig) -> PlatformResult<Self> {
        let platform = Self::new();
        for channel in &config.channels {
            platform.create_channel(channel)?;
        }
        for binder in &config.binders {
            platform.create_binder(binder)?;
        }
        for projection in &config.projections {
            platform.build_projection(projection)?;
        }
        for query in &config.queries {
            platform.register_query(query)?;
        }
        for command in &config.commands {
            platform.register_publish_command(command)?;
        }

        tracing::info!(
            event = %Event::ConfigLoaded,
            channels = config.channels.len(),
            binders = config.binders.len(),
            projections = config.projections.len(),
            queries = config.queries.len(),
            commands = config.commands.len(),
            "platform assembled"
        );
        Ok(platform)
    }

    // ==================
    // Admin operations
    // ==================

    /// Create an empty channel
    pub fn create_channel(&self, name: &str) -> PlatformResult<()> {
        self.channels.create_channel(name)?;
        Ok(())
    }

    /// Create an empty in-memory binder
    pub fn create_binder(&self, name: &str) -> PlatformResult<Arc<dyn Binder>> {
        Ok(self.binders.create(name)?)
    }

    /// Project a channel into a binder, replaying the channel's history
    pub fn build_projection(&self, decl: &ProjectionDecl) -> PlatformResult<Arc<Projection>> {
        let binder = self.binders.get(&decl.binder)?;
        let projection = Projection::new(&decl.name, &decl.channel, binder, &decl.id_field);
        Ok(self.channels.add_projection(projection)?)
    }

    /// Channel names, sorted
    pub fn list_channels(&self) -> Vec<String> {
        self.channels.list_channels()
    }

    /// Binder names, sorted
    pub fn list_binders(&self) -> Vec<String> {
        self.binders.list()
    }

    /// Projection names, in creation order
    pub fn list_projections(&self) -> Vec<String> {
        self.channels.list_projections()
    }

    /// Look up a projection
    pub fn get_projection(&self, name: &str) -> PlatformResult<Arc<Projection>> {
        Ok(self.channels.projection(name)?)
    }

    /// Append an event to a channel and run its projections
    pub fn publish(&self, channel: &str, payload: Document) -> PlatformResult<ChannelEvent> {
        let event = self.channels.publish(channel, payload)?;
        self.metrics.increment_events_published();
        Ok(event)
    }

    // ==================
    // Dispatch
    // ==================

    /// Register a declared query: all predicates must hold, then the optional limit applies
    pub fn register_query(&self, decl: &QueryDecl) -> PlatformResult<Arc<QueryDefinition>> {
        let binder = self.binders.get(&decl.binder)?;
        let predicates = decl.predicates.clone();
        let mut query = QueryDefinition::new(
            &decl.name,
            binder,
            move |doc: &Document, ctx: &mut QueryContext| {
                PredicateFilter::matches(doc, &predicates, ctx)
            },
        );
        if let Some(limit) = decl.limit {
            query = query.with_limit(limit);
        }
        Ok(self.cqrs.register_query(query)?)
    }

    /// Register a command that publishes its payload to a channel
    pub fn register_publish_command(&self, decl: &CommandDecl) -> PlatformResult<()> {
        self.channels.channel(&decl.channel)?;

        let channels = Arc::clone(&self.channels);
        let metrics = Arc::clone(&self.metrics);
        let command = decl.name.clone();
        let channel = decl.channel.clone();
        self.cqrs.register_command(&decl.name, move |payload: Document| {
            let result = channels
                .publish(&channel, payload)
                .map(|_| metrics.increment_events_published())
                .map_err(|e| CqrsError::handler_failure(&command, e));
            async move { result }
        })?;
        Ok(())
    }

    /// Binder registry
    pub fn binders(&self) -> &Arc<BinderRegistry> {
        &self.binders
    }

    /// Channel registry
    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    /// Command/query dispatch
    pub fn cqrs(&self) -> &Arc<CqrsManager> {
        &self.cqrs
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }
}
