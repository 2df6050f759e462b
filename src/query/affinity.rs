//! # Context Affinity
//!
//! Every thread is one logical execution context with a process-unique
//! [`ContextId`]. An execution latches the first context it is used from and
//! rejects every later call made from anywhere else. This is what lets the
//! execution mutate its byte counter and query context without locks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_CONTEXT: ContextId = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
}

/// Identity of a logical execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// The context the caller is running on
    pub fn current() -> Self {
        CURRENT_CONTEXT.with(|id| *id)
    }

    /// Raw numeric id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Latches the first context that touches an execution.
#[derive(Debug, Default)]
pub struct ContextLatch {
    owner: Option<ContextId>,
}

/// A call made off the latched context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    /// The latched context
    pub expected: ContextId,
    /// The context the call came from
    pub actual: ContextId,
}

impl ContextLatch {
    /// Create an unlatched latch
    pub fn new() -> Self {
        Self::default()
    }

    /// The latched context, if any call has been made yet
    pub fn owner(&self) -> Option<ContextId> {
        self.owner
    }

    /// Latch on first use, then require every call to come from the same context
    pub fn check(&mut self) -> Result<ContextId, Violation> {
        let actual = ContextId::current();
        match self.owner {
            None => {
                self.owner = Some(actual);
                Ok(actual)
            }
            Some(expected) if expected == actual => Ok(actual),
            Some(expected) => Err(Violation { expected, actual }),
        }
    }
}
