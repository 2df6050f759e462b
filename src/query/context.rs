//! # Query Context
//!
//! Per-execution state: the bound parameters and the early-completion flag.
//! A context is owned by exactly one execution and shares its context affinity.

use serde_json::Value;

use crate::binder::Document;

/// State of one query invocation
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    params: Document,
    complete: bool,
    accepted: u64,
}

impl QueryContext {
    /// Create a context over the invocation's bound parameters
    pub fn new(params: Document) -> Self {
        Self {
            params,
            complete: false,
            accepted: 0,
        }
    }

    /// All bound parameters
    pub fn params(&self) -> &Document {
        &self.params
    }

    /// A single bound parameter
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Whether the filter or completion predicate has requested early stop
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Request that the execution stop after the current document
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Number of documents accepted so far
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub(crate) fn record_accepted(&mut self) {
        self.accepted += 1;
    }
}
