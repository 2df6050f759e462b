//! Query engine for docflow
//!
//! Streams the documents a query accepts from a binder to a sink without
//! unbounded buffering.
//!
//! # Execution Flow
//!
//! 1. Resolve the query definition (name, binder, filter, completion)
//! 2. Bind the invocation's parameters into a fresh [`QueryContext`]
//! 3. Open a cursor over the binder that accepts every raw candidate
//! 4. Pull candidates, filter them against the context
//! 5. Render accepted documents to the sink, counting unacknowledged bytes
//! 6. Pause the cursor above the high watermark, resume below the low one
//! 7. Close cursor and sink exactly once
//!
//! # Invariants
//!
//! - Context affinity: an execution is only ever touched from the context it latched
//! - Ordering: accepted documents reach the sink in cursor order
//! - Accounting: the unacknowledged counter never goes negative

mod affinity;
mod context;
mod definition;
mod errors;
mod execution;
mod filters;
mod flow;
mod sink;

pub use affinity::{ContextId, ContextLatch, Violation};
pub use context::QueryContext;
pub use definition::{CompletionPredicate, DocumentFilter, QueryDefinition};
pub use errors::{FilterError, FilterResult, QueryError, QueryResult, Severity};
pub use execution::{ExecutionState, QueryExecution, DEFAULT_PUMP_BATCH};
pub use filters::{CompareOp, Operand, ParamKind, Predicate, PredicateFilter};
pub use flow::{FlowSignal, UnackedBytes, Watermarks, DEFAULT_HIGH_WATERMARK};
pub use sink::{BufferSink, CloseReason, JsonArrayEnvelope, QuerySink};
