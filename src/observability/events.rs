//! Observability events for docflow
//!
//! Every lifecycle log line carries one of these as its `event` field so that
//! logs can be filtered on a stable name. Events are explicit and typed.

use std::fmt;

/// Observable events in docflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Server lifecycle
    /// Server boot begins
    ServerStart,
    /// Server bound and serving
    Serving,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,
    /// A route was exposed
    RouteRegistered,

    // Query executions
    /// Execution opened and started
    ExecutionOpen,
    /// Cursor paused on backpressure
    ExecutionPaused,
    /// Cursor resumed after acks
    ExecutionResumed,
    /// Execution reached its terminal state
    ExecutionClosed,
    /// Execution failed (filter or cursor)
    ExecutionFailed,
    /// Execution used off its latched context (FATAL)
    ContextViolation,

    // Commands and lookups
    /// Command handler succeeded
    CommandHandled,
    /// Command handler failed
    CommandFailed,
    /// Document lookup failed
    LookupFailed,

    // Channels
    /// Event appended to a channel
    EventPublished,
    /// Projection failed to apply an event
    ProjectionFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ServerStart => "SERVER_START",
            Event::Serving => "SERVING",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",

            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::RouteRegistered => "ROUTE_REGISTERED",

            Event::ExecutionOpen => "EXECUTION_OPEN",
            Event::ExecutionPaused => "EXECUTION_PAUSED",
            Event::ExecutionResumed => "EXECUTION_RESUMED",
            Event::ExecutionClosed => "EXECUTION_CLOSED",
            Event::ExecutionFailed => "EXECUTION_FAILED",
            Event::ContextViolation => "CONTEXT_VIOLATION",

            Event::CommandHandled => "COMMAND_HANDLED",
            Event::CommandFailed => "COMMAND_FAILED",
            Event::LookupFailed => "LOOKUP_FAILED",

            Event::EventPublished => "EVENT_PUBLISHED",
            Event::ProjectionFailed => "PROJECTION_FAILED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::ContextViolation)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
