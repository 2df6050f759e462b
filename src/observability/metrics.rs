//! Metrics registry for docflow
//!
//! - Counters only, monotonic, reset only on process start
//! - Thread-safe but lock-minimal: executions on different contexts share one
//!   registry through `Arc`

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::query::CloseReason;

/// Metrics registry containing all operational counters
///
/// Uses Relaxed ordering; counters are independent of each other.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    executions_opened: AtomicU64,
    executions_completed: AtomicU64,
    executions_cancelled: AtomicU64,
    executions_failed: AtomicU64,
    documents_streamed: AtomicU64,
    documents_filtered: AtomicU64,
    bytes_streamed: AtomicU64,
    pauses: AtomicU64,
    resumes: AtomicU64,
    context_violations: AtomicU64,
    commands_succeeded: AtomicU64,
    commands_failed: AtomicU64,
    lookups_failed: AtomicU64,
    events_published: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Execution metrics

    /// Increment executions opened
    pub fn increment_executions_opened(&self) {
        self.executions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a terminal execution under its close reason
    pub fn record_execution_closed(&self, reason: CloseReason) {
        let counter = match reason {
            CloseReason::Completed => &self.executions_completed,
            CloseReason::Cancelled => &self.executions_cancelled,
            CloseReason::Failed => &self.executions_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Add streamed documents and their rendered size
    pub fn add_documents_streamed(&self, documents: u64, bytes: u64) {
        self.documents_streamed.fetch_add(documents, Ordering::Relaxed);
        self.bytes_streamed.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Increment documents rejected by a filter
    pub fn increment_documents_filtered(&self) {
        self.documents_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment cursor pauses
    pub fn increment_pauses(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment cursor resumes
    pub fn increment_resumes(&self) {
        self.resumes.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment context violations
    pub fn increment_context_violations(&self) {
        self.context_violations.fetch_add(1, Ordering::Relaxed);
    }

    // Command and lookup metrics

    /// Increment successful commands
    pub fn increment_commands_succeeded(&self) {
        self.commands_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed commands
    pub fn increment_commands_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment failed lookups
    pub fn increment_lookups_failed(&self) {
        self.lookups_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment events published to channels
    pub fn increment_events_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions_opened: self.executions_opened.load(Ordering::Relaxed),
            executions_completed: self.executions_completed.load(Ordering::Relaxed),
            executions_cancelled: self.executions_cancelled.load(Ordering::Relaxed),
            executions_failed: self.executions_failed.load(Ordering::Relaxed),
            documents_streamed: self.documents_streamed.load(Ordering::Relaxed),
            documents_filtered: self.documents_filtered.load(Ordering::Relaxed),
            bytes_streamed: self.bytes_streamed.load(Ordering::Relaxed),
            pauses: self.pauses.load(Ordering::Relaxed),
            resumes: self.resumes.load(Ordering::Relaxed),
            context_violations: self.context_violations.load(Ordering::Relaxed),
            commands_succeeded: self.commands_succeeded.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            lookups_failed: self.lookups_failed.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub executions_opened: u64,
    pub executions_completed: u64,
    pub executions_cancelled: u64,
    pub executions_failed: u64,
    pub documents_streamed: u64,
    pub documents_filtered: u64,
    pub bytes_streamed: u64,
    pub pauses: u64,
    pub resumes: u64,
    pub context_violations: u64,
    pub commands_succeeded: u64,
    pub commands_failed: u64,
    pub lookups_failed: u64,
    pub events_published: u64,
}
