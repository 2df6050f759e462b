//! # Query Sinks
//!
//! A sink renders accepted documents for one transport and reports how many
//! bytes each rendering produced. Acknowledgement travels the other way: once
//! the transport has taken the bytes, the driver of the execution feeds them
//! back through `QueryExecution::handle_ack` on the execution's own context.
//!
//! Sinks render an implicit JSON array: `[` before the first element, `,`
//! between elements, `]` after the last. [`JsonArrayEnvelope`] tracks that so
//! concrete sinks don't have to.

use std::mem;

use crate::binder::Document;

/// Why an execution reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The final document was emitted or no candidates remained
    Completed,
    /// The consumer went away or the execution was closed externally
    Cancelled,
    /// The filter or cursor failed
    Failed,
}

impl CloseReason {
    /// Lowercase label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Completed => "completed",
            CloseReason::Cancelled => "cancelled",
            CloseReason::Failed => "failed",
        }
    }
}

/// Output side of a query execution.
pub trait QuerySink {
    /// Render one accepted document and return the number of bytes written.
    ///
    /// `last` is true for the final document this execution will ever emit.
    fn write_query_result(&mut self, document: &Document, last: bool) -> usize;

    /// Called exactly once when the execution reaches its terminal state.
    fn end(&mut self, reason: CloseReason);
}

/// Delimiter bookkeeping for a streamed JSON array
#[derive(Debug, Default)]
pub struct JsonArrayEnvelope {
    elements: u64,
    closed: bool,
}

impl JsonArrayEnvelope {
    /// Opening delimiter
    pub const OPEN: &'static str = "[";
    /// Closing delimiter
    pub const CLOSE: &'static str = "]";

    /// Create an envelope with no elements
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one element with its separator, closing the array if `last`
    pub fn element(&mut self, document: &Document, last: bool) -> String {
        let encoded = document.encode();
        let mut out = String::with_capacity(encoded.len() + 2);
        if self.elements > 0 {
            out.push(',');
        }
        out.push_str(&encoded);
        if last {
            out.push_str(Self::CLOSE);
            self.closed = true;
        }
        self.elements += 1;
        out
    }

    /// Closing delimiter, if the array has not been closed yet
    pub fn finish(&mut self) -> Option<&'static str> {
        if mem::replace(&mut self.closed, true) {
            None
        } else {
            Some(Self::CLOSE)
        }
    }

    /// Number of elements rendered
    pub fn elements(&self) -> u64 {
        self.elements
    }

    /// Whether the closing delimiter has been rendered
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Sink that renders into an in-memory buffer.
///
/// Every write is handed off immediately, so its byte count is queued as a
/// pending ack for the driver to collect with [`BufferSink::take_acks`].
#[derive(Debug)]
pub struct BufferSink {
    buffer: Vec<u8>,
    envelope: JsonArrayEnvelope,
    pending_acks: Vec<usize>,
    end: Option<CloseReason>,
}

impl BufferSink {
    /// Create a sink with the opening delimiter already rendered
    pub fn new() -> Self {
        Self {
            buffer: JsonArrayEnvelope::OPEN.as_bytes().to_vec(),
            envelope: JsonArrayEnvelope::new(),
            pending_acks: Vec::new(),
            end: None,
        }
    }

    /// Drain acks for bytes written since the last call
    pub fn take_acks(&mut self) -> Vec<usize> {
        mem::take(&mut self.pending_acks)
    }

    /// Rendered output so far
    pub fn output(&self) -> &[u8] {
        &self.buffer
    }

    /// Rendered output as UTF-8
    pub fn output_str(&self) -> &str {
        std::str::from_utf8(&self.buffer).unwrap_or_default()
    }

    /// How the execution ended, once it has
    pub fn end_reason(&self) -> Option<CloseReason> {
        self.end
    }

    /// Number of documents rendered
    pub fn documents(&self) -> u64 {
        self.envelope.elements()
    }
}

impl Default for BufferSink {
    fn default() -> Self {
        Self::new()
    }
}

impl QuerySink for BufferSink {
    fn write_query_result(&mut self, document: &Document, last: bool) -> usize {
        let chunk = self.envelope.element(document, last);
        self.buffer.extend_from_slice(chunk.as_bytes());
        self.pending_acks.push(chunk.len());
        chunk.len()
    }

    fn end(&mut self, reason: CloseReason) {
        if reason == CloseReason::Completed {
            if let Some(close) = self.envelope.finish() {
                self.buffer.extend_from_slice(close.as_bytes());
            }
        }
        self.end = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(n: i64) -> Document {
        Document::new().with("n", n)
    }

    #[test]
    fn test_envelope_separators() {
        let mut env = JsonArrayEnvelope::new();
        assert_eq!(env.element(&doc(1), false), r#"{"n":1}"#);
        assert_eq!(env.element(&doc(2), true), r#",{"n":2}]"#);
        assert_eq!(env.finish(), None);
    }

    #[test]
    fn test_empty_array_closes_once() {
        let mut env = JsonArrayEnvelope::new();
        assert_eq!(env.finish(), Some("]"));
        assert_eq!(env.finish(), None);
    }

    #[test]
    fn test_buffer_sink_renders_valid_json() {
        let mut sink = BufferSink::new();
        sink.write_query_result(&doc(1), false);
        sink.write_query_result(&doc(2), false);
        // Stream ends on a rejected final candidate
        sink.end(CloseReason::Completed);

        let parsed: serde_json::Value = serde_json::from_slice(sink.output()).unwrap();
        assert_eq!(parsed, serde_json::json!([{"n": 1}, {"n": 2}]));
        assert_eq!(sink.take_acks(), vec![7, 8]);
        assert!(sink.take_acks().is_empty());
    }

    #[test]
    fn test_cancelled_stream_left_open() {
        let mut sink = BufferSink::new();
        sink.write_query_result(&doc(1), false);
        sink.end(CloseReason::Cancelled);
        assert_eq!(sink.output_str(), r#"[{"n":1}"#);
        assert_eq!(sink.end_reason(), Some(CloseReason::Cancelled));
    }
}
