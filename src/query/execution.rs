//! # Query Execution
//!
//! One streaming query invocation: a cursor over the target binder, the
//! query's filter, a sink, and the unacknowledged-byte counter that couples
//! them.
//!
//! ## Lifecycle
//!
//! ```text
//! Created --start--> Running <--pause/resume--> Paused
//!                       |                          |
//!                       +----------finish----------+--> Closed
//! ```
//!
//! The execution is driven from a single logical context. Whoever owns it
//! calls [`QueryExecution::pump`] to pull documents while the execution is
//! running, and [`QueryExecution::handle_ack`] whenever the sink reports bytes
//! handed off. Every entry point latches the first calling context and fails
//! with [`QueryError::WrongContext`] from anywhere else, which is what allows
//! all of the state below to be mutated without locks.
//!
//! ## Invariants
//!
//! - Accepted documents reach the sink in cursor order
//! - `last = true` reaches the sink at most once, and nothing after it
//! - The cursor is closed exactly once, on the way into `Closed`
//! - A closed execution drops deliveries instead of failing

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::binder::{match_all, Document, DocumentCursor};
use crate::observability::{Event, MetricsRegistry};

use super::affinity::{ContextId, ContextLatch};
use super::context::QueryContext;
use super::definition::QueryDefinition;
use super::errors::{QueryError, QueryResult};
use super::flow::{FlowSignal, UnackedBytes, Watermarks};
use super::sink::{CloseReason, QuerySink};

/// Documents pulled per [`QueryExecution::pump`] call unless configured otherwise
pub const DEFAULT_PUMP_BATCH: usize = 64;

/// Execution lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Cursor opened, delivery not started
    Created,
    /// Cursor delivering
    Running,
    /// Cursor paused on backpressure
    Paused,
    /// Terminal
    Closed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::Created => write!(f, "created"),
            ExecutionState::Running => write!(f, "running"),
            ExecutionState::Paused => write!(f, "paused"),
            ExecutionState::Closed => write!(f, "closed"),
        }
    }
}

/// A single streaming invocation of a query
pub struct QueryExecution<S: QuerySink> {
    id: Uuid,
    query: Arc<QueryDefinition>,
    context: QueryContext,
    cursor: Box<dyn DocumentCursor>,
    sink: S,
    flow: UnackedBytes,
    state: ExecutionState,
    latch: ContextLatch,
    emitted: u64,
    filtered: u64,
    close_reason: Option<CloseReason>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<S: QuerySink> QueryExecution<S> {
    /// Open an execution over the query's binder.
    ///
    /// The cursor accepts every raw candidate; filtering happens here so that
    /// context-dependent filters see the bound parameters.
    pub fn new(query: Arc<QueryDefinition>, params: Document, sink: S, watermarks: Watermarks) -> Self {
        let cursor = query.binder().get_matching(match_all());
        Self::with_cursor(query, QueryContext::new(params), cursor, sink, watermarks)
    }

    /// Open an execution over an already-opened cursor
    pub fn with_cursor(
        query: Arc<QueryDefinition>,
        context: QueryContext,
        cursor: Box<dyn DocumentCursor>,
        sink: S,
        watermarks: Watermarks,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            query,
            context,
            cursor,
            sink,
            flow: UnackedBytes::new(watermarks),
            state: ExecutionState::Created,
            latch: ContextLatch::new(),
            emitted: 0,
            filtered: 0,
            close_reason: None,
            metrics: None,
        }
    }

    /// Report into a shared metrics registry
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start cursor delivery. Calling it again is a no-op.
    pub fn start(&mut self) -> QueryResult<()> {
        self.check_context()?;
        if self.state != ExecutionState::Created {
            return Ok(());
        }
        self.state = ExecutionState::Running;
        self.cursor.start();
        if let Some(m) = &self.metrics {
            m.increment_executions_opened();
        }
        tracing::debug!(
            event = %Event::ExecutionOpen,
            execution_id = %self.id,
            query = self.query.name(),
            binder = self.query.binder().name(),
            "execution started"
        );
        Ok(())
    }

    /// Pull up to `budget` documents from the cursor while running.
    ///
    /// Returns the number of documents delivered. Closes the execution when the
    /// cursor reports no remaining candidates.
    pub fn pump(&mut self, budget: usize) -> QueryResult<usize> {
        self.check_context()?;
        let mut delivered = 0;
        while self.state == ExecutionState::Running && delivered < budget {
            let item = match self.cursor.next_document() {
                Ok(item) => item,
                Err(e) => {
                    self.finish(CloseReason::Failed);
                    return Err(QueryError::LookupFailure(e.to_string()));
                }
            };
            match item {
                Some(item) => {
                    delivered += 1;
                    self.on_document(item.document, item.has_more)?;
                }
                None => {
                    if !self.cursor.has_more() {
                        self.finish(CloseReason::Completed);
                    }
                    break;
                }
            }
        }
        Ok(delivered)
    }

    /// Per-document callback: filter, then hand accepted documents to [`Self::handle`].
    ///
    /// A rejected document does not count toward backpressure, but if it was
    /// the final candidate the execution still closes.
    pub fn on_document(&mut self, document: Document, has_more: bool) -> QueryResult<()> {
        self.check_context()?;
        self.check_started()?;
        if self.state == ExecutionState::Closed {
            return Ok(());
        }

        let accepted = match self.query.evaluate(&document, &mut self.context) {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(
                    event = %Event::ExecutionFailed,
                    execution_id = %self.id,
                    query = self.query.name(),
                    error = %e,
                    "document filter failed"
                );
                self.finish(CloseReason::Failed);
                return Err(QueryError::HandlerFailure {
                    query: self.query.name().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let last = !has_more || self.context.is_complete();
        if accepted {
            return self.handle(document, last);
        }

        self.filtered += 1;
        if let Some(m) = &self.metrics {
            m.increment_documents_filtered();
        }
        if last {
            self.finish(CloseReason::Completed);
        }
        Ok(())
    }

    /// Render an accepted document and apply backpressure.
    pub fn handle(&mut self, document: Document, last: bool) -> QueryResult<()> {
        self.check_context()?;
        self.check_started()?;
        if self.state == ExecutionState::Closed {
            return Ok(());
        }

        let bytes = self.sink.write_query_result(&document, last) as u64;
        self.emitted += 1;
        if let Some(m) = &self.metrics {
            m.add_documents_streamed(1, bytes);
        }

        if self.flow.record(bytes) == FlowSignal::Pause && self.state == ExecutionState::Running {
            self.cursor.pause();
            self.state = ExecutionState::Paused;
            if let Some(m) = &self.metrics {
                m.increment_pauses();
            }
            tracing::debug!(
                event = %Event::ExecutionPaused,
                execution_id = %self.id,
                outstanding = self.flow.outstanding(),
                "cursor paused"
            );
        }

        if last {
            self.finish(CloseReason::Completed);
        }
        Ok(())
    }

    /// Account for bytes the sink has handed off, resuming below the low watermark.
    ///
    /// Acks keep arriving after close while the sink drains; they are still
    /// counted so the counter settles at zero.
    pub fn handle_ack(&mut self, bytes: usize) -> QueryResult<()> {
        self.check_context()?;
        let signal = self.flow.acknowledge(bytes as u64)?;
        if signal == FlowSignal::Resume && self.state == ExecutionState::Paused {
            self.cursor.resume();
            self.state = ExecutionState::Running;
            if let Some(m) = &self.metrics {
                m.increment_resumes();
            }
            tracing::debug!(
                event = %Event::ExecutionResumed,
                execution_id = %self.id,
                outstanding = self.flow.outstanding(),
                "cursor resumed"
            );
        }
        Ok(())
    }

    /// Close the execution from outside, e.g. when the consumer disconnects.
    ///
    /// Safe mid-stream and safe to repeat; only the first close has any effect.
    pub fn close(&mut self) -> QueryResult<()> {
        self.check_context()?;
        self.finish(CloseReason::Cancelled);
        Ok(())
    }

    fn finish(&mut self, reason: CloseReason) {
        if self.state == ExecutionState::Closed {
            return;
        }
        self.cursor.close();
        self.sink.end(reason);
        self.state = ExecutionState::Closed;
        self.close_reason = Some(reason);

        if let Some(m) = &self.metrics {
            m.record_execution_closed(reason);
        }
        tracing::debug!(
            event = %Event::ExecutionClosed,
            execution_id = %self.id,
            query = self.query.name(),
            reason = reason.as_str(),
            emitted = self.emitted,
            filtered = self.filtered,
            "execution closed"
        );
    }

    /// Documents may only arrive once `start` has run
    fn check_started(&self) -> QueryResult<()> {
        if self.state == ExecutionState::Created {
            return Err(QueryError::NotStarted(self.id));
        }
        Ok(())
    }

    fn check_context(&mut self) -> QueryResult<()> {
        match self.latch.check() {
            Ok(_) => Ok(()),
            Err(violation) => {
                if let Some(m) = &self.metrics {
                    m.increment_context_violations();
                }
                let thread = std::thread::current();
                tracing::error!(
                    event = %Event::ContextViolation,
                    execution_id = %self.id,
                    query = self.query.name(),
                    expected = %violation.expected,
                    actual = %violation.actual,
                    thread = ?thread.name(),
                    "execution used off its context"
                );
                Err(QueryError::WrongContext {
                    expected: violation.expected,
                    actual: violation.actual,
                })
            }
        }
    }

    /// Execution id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The query being executed
    pub fn query(&self) -> &QueryDefinition {
        &self.query
    }

    /// Lifecycle state
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Whether the cursor is actively delivering
    pub fn is_running(&self) -> bool {
        self.state == ExecutionState::Running
    }

    /// Whether the execution is terminal
    pub fn is_closed(&self) -> bool {
        self.state == ExecutionState::Closed
    }

    /// How the execution ended, once it has
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// The latched context, once any operation has run
    pub fn context_id(&self) -> Option<ContextId> {
        self.latch.owner()
    }

    /// Rendered-but-unacknowledged bytes
    pub fn outstanding_bytes(&self) -> u64 {
        self.flow.outstanding()
    }

    /// Documents handed to the sink
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Documents rejected by the filter
    pub fn filtered(&self) -> u64 {
        self.filtered
    }

    /// Per-invocation query state
    pub fn query_context(&self) -> &QueryContext {
        &self.context
    }

    /// Borrow the sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutably borrow the sink
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: QuerySink> fmt::Debug for QueryExecution<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExecution")
            .field("id", &self.id)
            .field("query", &self.query.name())
            .field("state", &self.state)
            .field("outstanding", &self.flow.outstanding())
            .field("emitted", &self.emitted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::binder::{Binder, BinderResult, CursorItem, CursorState, MemoryBinder, MemoryCursor};
    use crate::query::sink::BufferSink;
    use crate::query::FilterError;

    /// Cursor that records every control call it receives
    struct RecordingCursor {
        inner: MemoryCursor,
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl RecordingCursor {
        fn new(docs: Vec<Document>) -> (Box<dyn DocumentCursor>, Rc<RefCell<Vec<&'static str>>>) {
            let calls = Rc::new(RefCell::new(Vec::new()));
            let cursor = Self {
                inner: MemoryCursor::new(docs),
                calls: Rc::clone(&calls),
            };
            (Box::new(cursor), calls)
        }
    }

    impl DocumentCursor for RecordingCursor {
        fn start(&mut self) {
            self.calls.borrow_mut().push("start");
            self.inner.start();
        }
        fn pause(&mut self) {
            self.calls.borrow_mut().push("pause");
            self.inner.pause();
        }
        fn resume(&mut self) {
            self.calls.borrow_mut().push("resume");
            self.inner.resume();
        }
        fn close(&mut self) {
            self.calls.borrow_mut().push("close");
            self.inner.close();
        }
        fn next_document(&mut self) -> BinderResult<Option<CursorItem>> {
            self.inner.next_document()
        }
        fn has_more(&self) -> bool {
            self.inner.has_more()
        }
        fn state(&self) -> CursorState {
            self.inner.state()
        }
    }

    /// Sink whose writes report a size carried in the document itself
    #[derive(Default)]
    struct SizedSink {
        written: Vec<(i64, bool)>,
        ended: Vec<CloseReason>,
    }

    impl QuerySink for SizedSink {
        fn write_query_result(&mut self, document: &Document, last: bool) -> usize {
            let size = document.get("size").and_then(|v| v.as_i64()).unwrap_or(1);
            self.written.push((size, last));
            size as usize
        }
        fn end(&mut self, reason: CloseReason) {
            self.ended.push(reason);
        }
    }

    fn sized(size: i64) -> Document {
        Document::new().with("size", size)
    }

    fn numbered(n: i64) -> Document {
        Document::new().with("n", n)
    }

    fn empty_binder() -> Arc<dyn Binder> {
        Arc::new(MemoryBinder::new("test"))
    }

    fn execution_over<S: QuerySink>(
        query: QueryDefinition,
        docs: Vec<Document>,
        sink: S,
        high: u64,
    ) -> (QueryExecution<S>, Rc<RefCell<Vec<&'static str>>>) {
        let (cursor, calls) = RecordingCursor::new(docs);
        let execution = QueryExecution::with_cursor(
            Arc::new(query),
            QueryContext::default(),
            cursor,
            sink,
            Watermarks::with_high(high).unwrap(),
        );
        (execution, calls)
    }

    #[test]
    fn test_watermark_scenario() {
        let query = QueryDefinition::accept_all("sized", empty_binder());
        let (mut exec, calls) = execution_over(query, vec![], SizedSink::default(), 1000);
        exec.start().unwrap();

        exec.on_document(sized(600), true).unwrap();
        assert_eq!(exec.state(), ExecutionState::Running);

        exec.on_document(sized(600), true).unwrap();
        assert_eq!(exec.state(), ExecutionState::Paused);
        assert_eq!(exec.outstanding_bytes(), 1200);

        // 500 is not strictly below the low watermark
        exec.handle_ack(700).unwrap();
        assert_eq!(exec.state(), ExecutionState::Paused);

        exec.handle_ack(1).unwrap();
        assert_eq!(exec.state(), ExecutionState::Running);

        exec.on_document(sized(200), false).unwrap();
        assert!(exec.is_closed());
        assert_eq!(exec.close_reason(), Some(CloseReason::Completed));

        assert_eq!(
            *calls.borrow(),
            vec!["start", "pause", "resume", "close"]
        );
        assert_eq!(exec.sink().written, vec![(600, false), (600, false), (200, true)]);
        assert_eq!(exec.sink().ended, vec![CloseReason::Completed]);
    }

    #[test]
    fn test_pump_streams_filtered_subset_in_order() {
        let query = QueryDefinition::new("odd", empty_binder(), |doc, _| {
            Ok(doc.get("n").and_then(|v| v.as_i64()).unwrap_or(0) % 2 == 1)
        });
        let docs = (1..=6).map(numbered).collect();
        let (mut exec, _) = execution_over(query, docs, BufferSink::new(), 1 << 20);

        exec.start().unwrap();
        exec.pump(DEFAULT_PUMP_BATCH).unwrap();

        assert!(exec.is_closed());
        assert_eq!(exec.sink().output_str(), r#"[{"n":1},{"n":3},{"n":5}]"#);
        assert_eq!(exec.emitted(), 3);
        assert_eq!(exec.filtered(), 3);
    }

    #[test]
    fn test_reject_all_still_closes() {
        let query = QueryDefinition::new("none", empty_binder(), |_, _| Ok(false));
        let docs = (1..=3).map(numbered).collect();
        let (mut exec, calls) = execution_over(query, docs, BufferSink::new(), 1 << 20);

        exec.start().unwrap();
        exec.pump(DEFAULT_PUMP_BATCH).unwrap();

        assert!(exec.is_closed());
        assert_eq!(exec.sink().documents(), 0);
        assert_eq!(exec.sink().output_str(), "[]");
        assert_eq!(calls.borrow().iter().filter(|c| **c == "close").count(), 1);
    }

    #[test]
    fn test_empty_binder_closes() {
        let query = QueryDefinition::accept_all("all", empty_binder());
        let mut exec = QueryExecution::new(
            Arc::new(query),
            Document::new(),
            BufferSink::new(),
            Watermarks::default(),
        );
        exec.start().unwrap();
        assert_eq!(exec.pump(10).unwrap(), 0);
        assert!(exec.is_closed());
        assert_eq!(exec.sink().output_str(), "[]");
    }

    #[test]
    fn test_pump_respects_budget() {
        let query = QueryDefinition::accept_all("all", empty_binder());
        let docs = (1..=5).map(numbered).collect();
        let (mut exec, _) = execution_over(query, docs, BufferSink::new(), 1 << 20);
        exec.start().unwrap();
        assert_eq!(exec.pump(2).unwrap(), 2);
        assert!(exec.is_running());
        assert_eq!(exec.pump(10).unwrap(), 3);
        assert!(exec.is_closed());
    }

    #[test]
    fn test_pump_before_start_delivers_nothing() {
        let query = QueryDefinition::accept_all("all", empty_binder());
        let (mut exec, _) = execution_over(query, vec![numbered(1)], BufferSink::new(), 1 << 20);
        assert_eq!(exec.pump(10).unwrap(), 0);
        assert_eq!(exec.state(), ExecutionState::Created);
    }

    #[test]
    fn test_documents_before_start_are_rejected() {
        let query = QueryDefinition::accept_all("all", empty_binder());
        let (mut exec, _) = execution_over(query, vec![], BufferSink::new(), 1 << 20);

        let err = exec.on_document(numbered(1), false).unwrap_err();
        assert_eq!(err.code(), "DOCFLOW_NOT_STARTED");
        assert!(matches!(exec.handle(numbered(2), true), Err(QueryError::NotStarted(_))));

        assert_eq!(exec.sink().output_str(), "[");
        assert_eq!(exec.sink().documents(), 0);
        assert_eq!(exec.outstanding_bytes(), 0);
        assert_eq!(exec.emitted(), 0);
        assert_eq!(exec.state(), ExecutionState::Created);

        exec.start().unwrap();
        exec.on_document(numbered(3), false).unwrap();
        assert_eq!(exec.sink().output_str(), r#"[{"n":3}"#);
    }

    #[test]
    fn test_limit_ends_stream_early() {
        let query = QueryDefinition::accept_all("first-two", empty_binder()).with_limit(2);
        let docs = (1..=5).map(numbered).collect();
        let (mut exec, calls) = execution_over(query, docs, BufferSink::new(), 1 << 20);

        exec.start().unwrap();
        assert_eq!(exec.pump(DEFAULT_PUMP_BATCH).unwrap(), 2);
        assert!(exec.is_closed());
        assert_eq!(exec.sink().output_str(), r#"[{"n":1},{"n":2}]"#);
        assert_eq!(calls.borrow().last(), Some(&"close"));
    }

    #[test]
    fn test_backpressure_pauses_pump() {
        let query = QueryDefinition::accept_all("all", empty_binder());
        let docs = (1..=10).map(|_| sized(100)).collect();
        let (mut exec, _) = execution_over(query, docs, SizedSink::default(), 250);

        exec.start().unwrap();
        // 100, 200, 300 > 250 -> paused after the third
        assert_eq!(exec.pump(DEFAULT_PUMP_BATCH).unwrap(), 3);
        assert_eq!(exec.state(), ExecutionState::Paused);
        assert_eq!(exec.pump(DEFAULT_PUMP_BATCH).unwrap(), 0);

        exec.handle_ack(300).unwrap();
        assert!(exec.is_running());
        assert_eq!(exec.pump(DEFAULT_PUMP_BATCH).unwrap(), 3);
    }

    #[test]
    fn test_acks_settle_counter_to_zero() {
        let query = QueryDefinition::accept_all("all", empty_binder());
        let docs = (1..=4).map(numbered).collect();
        let (mut exec, _) = execution_over(query, docs, BufferSink::new(), 1 << 20);

        exec.start().unwrap();
        exec.pump(DEFAULT_PUMP_BATCH).unwrap();
        for bytes in exec.sink_mut().take_acks() {
            exec.handle_ack(bytes).unwrap();
        }
        assert!(exec.is_closed());
        assert_eq!(exec.outstanding_bytes(), 0);
    }

    #[test]
    fn test_ack_overflow_rejected() {
        let query = QueryDefinition::accept_all("all", empty_binder());
        let (mut exec, _) = execution_over(query, vec![], SizedSink::default(), 1000);
        exec.start().unwrap();
        exec.on_document(sized(10), true).unwrap();
        assert!(matches!(
            exec.handle_ack(11),
            Err(QueryError::AckOverflow { acked: 11, outstanding: 10 })
        ));
    }

    #[test]
    fn test_close_is_idempotent_and_drops_later_documents() {
        let query = QueryDefinition::accept_all("all", empty_binder());
        let (mut exec, calls) = execution_over(query, vec![], SizedSink::default(), 1000);
        exec.start().unwrap();
        exec.on_document(sized(5), true).unwrap();

        exec.close().unwrap();
        exec.close().unwrap();
        exec.on_document(sized(5), true).unwrap();

        assert_eq!(exec.sink().written.len(), 1);
        assert_eq!(exec.sink().ended, vec![CloseReason::Cancelled]);
        assert_eq!(exec.close_reason(), Some(CloseReason::Cancelled));
        assert_eq!(calls.borrow().iter().filter(|c| **c == "close").count(), 1);
    }

    #[test]
    fn test_last_delivered_exactly_once() {
        let query = QueryDefinition::accept_all("all", empty_binder());
        let (mut exec, _) = execution_over(query, vec![], SizedSink::default(), 1000);
        exec.start().unwrap();
        exec.on_document(sized(1), false).unwrap();
        exec.on_document(sized(1), false).unwrap();
        let lasts = exec.sink().written.iter().filter(|(_, last)| *last).count();
        assert_eq!(lasts, 1);
    }

    #[test]
    fn test_filter_failure_closes_and_reports() {
        let query = QueryDefinition::new("broken", empty_binder(), |_, _| {
            Err(FilterError::Failed("cannot evaluate".into()))
        });
        let (mut exec, calls) = execution_over(query, vec![numbered(1)], SizedSink::default(), 1000);
        exec.start().unwrap();

        let err = exec.pump(DEFAULT_PUMP_BATCH).unwrap_err();
        assert!(matches!(err, QueryError::HandlerFailure { ref query, .. } if query == "broken"));
        assert_eq!(exec.close_reason(), Some(CloseReason::Failed));
        assert_eq!(exec.sink().ended, vec![CloseReason::Failed]);
        assert_eq!(calls.borrow().last(), Some(&"close"));
    }

    #[test]
    fn test_first_operation_latches_context() {
        let query = QueryDefinition::accept_all("all", empty_binder());
        let (mut exec, _) = execution_over(query, vec![], SizedSink::default(), 1000);
        assert_eq!(exec.context_id(), None);
        exec.start().unwrap();
        assert_eq!(exec.context_id(), Some(ContextId::current()));
    }
}
