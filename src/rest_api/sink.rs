//! # Chunked Response Sink
//!
//! Renders query results into a bounded queue of body frames. Bytes count as
//! delivered only when the response body pulls their frame off the queue, so
//! everything still waiting in the queue or in the local backlog stays
//! outstanding against the execution's watermarks.
//!
//! Once the queue is full, frames wait in a local backlog until the driver
//! hands them over through a reserved slot. Delivered bytes are collected with
//! [`ChunkedResponseSink::take_acked`] by the driver, which feeds them to the
//! execution on the execution's own context.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use futures_util::{stream, Stream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Permit, Sender};
use tokio::sync::Notify;

use crate::binder::Document;
use crate::query::{CloseReason, JsonArrayEnvelope, QuerySink};

/// One body chunk. An error aborts the response mid-stream.
pub type Chunk = Result<Bytes, io::Error>;

/// A queued body chunk and how many of its bytes the execution counted
#[derive(Debug)]
pub struct Frame {
    chunk: Chunk,
    ackable: usize,
}

impl Frame {
    fn new(chunk: Chunk, ackable: usize) -> Self {
        Self { chunk, ackable }
    }
}

/// Bytes pulled by the response body and not yet acked
#[derive(Debug, Default)]
pub struct DeliveredBytes {
    bytes: AtomicUsize,
    notify: Notify,
}

impl DeliveredBytes {
    fn record(&self, bytes: usize) {
        if bytes > 0 {
            self.bytes.fetch_add(bytes, Ordering::AcqRel);
            self.notify.notify_one();
        }
    }

    /// Take everything delivered since the last call
    pub fn take(&self) -> usize {
        self.bytes.swap(0, Ordering::AcqRel)
    }

    /// Wait until the body pulls more counted bytes
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Open a bounded queue of `capacity` frames.
///
/// Returns the sink writing into it and the body stream draining it. Every
/// frame the stream yields credits its counted bytes to the sink's
/// [`DeliveredBytes`].
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn chunk_queue(
    capacity: usize,
) -> (ChunkedResponseSink, impl Stream<Item = Chunk> + Send + 'static) {
    let (tx, rx) = mpsc::channel::<Frame>(capacity);
    let delivered = Arc::new(DeliveredBytes::default());
    let sink = ChunkedResponseSink::new(tx, Arc::clone(&delivered));

    let body = stream::unfold((rx, delivered), |(mut rx, delivered)| async move {
        let frame = rx.recv().await?;
        delivered.record(frame.ackable);
        Some((frame.chunk, (rx, delivered)))
    });
    (sink, body)
}

/// Query sink writing a chunked JSON array response
#[derive(Debug)]
pub struct ChunkedResponseSink {
    tx: Sender<Frame>,
    envelope: JsonArrayEnvelope,
    backlog: VecDeque<Frame>,
    delivered: Arc<DeliveredBytes>,
    disconnected: bool,
}

impl ChunkedResponseSink {
    fn new(tx: Sender<Frame>, delivered: Arc<DeliveredBytes>) -> Self {
        let mut sink = Self {
            tx,
            envelope: JsonArrayEnvelope::new(),
            backlog: VecDeque::new(),
            delivered,
            disconnected: false,
        };
        sink.push(Frame::new(
            Ok(Bytes::from_static(JsonArrayEnvelope::OPEN.as_bytes())),
            0,
        ));
        sink
    }

    /// Queue a frame behind any backlog
    fn push(&mut self, frame: Frame) {
        if self.disconnected {
            return;
        }
        if !self.backlog.is_empty() {
            self.backlog.push_back(frame);
            return;
        }
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => self.backlog.push_back(frame),
            Err(TrySendError::Closed(_)) => self.disconnected = true,
        }
    }

    /// Sending half of the queue, for the driver to wait on
    pub fn sender(&self) -> &Sender<Frame> {
        &self.tx
    }

    /// Delivery counter shared with the body stream
    pub fn delivered(&self) -> &Arc<DeliveredBytes> {
        &self.delivered
    }

    /// Whether frames are waiting for queue capacity
    pub fn has_backlog(&self) -> bool {
        !self.backlog.is_empty()
    }

    /// Whether the receiving side has gone away
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Send the oldest backlogged frame through a reserved slot
    pub fn send_backlog(&mut self, permit: Permit<'_, Frame>) {
        if let Some(frame) = self.backlog.pop_front() {
            permit.send(frame);
        }
    }

    /// Bytes the body has pulled since the last call
    pub fn take_acked(&mut self) -> usize {
        self.delivered.take()
    }
}

impl QuerySink for ChunkedResponseSink {
    fn write_query_result(&mut self, document: &Document, last: bool) -> usize {
        let rendered = self.envelope.element(document, last);
        let len = rendered.len();
        self.push(Frame::new(Ok(Bytes::from(rendered)), len));
        len
    }

    fn end(&mut self, reason: CloseReason) {
        match reason {
            CloseReason::Completed => {
                if let Some(close) = self.envelope.finish() {
                    self.push(Frame::new(Ok(Bytes::from_static(close.as_bytes())), 0));
                }
            }
            CloseReason::Failed => {
                self.push(Frame::new(
                    Err(io::Error::new(io::ErrorKind::Other, "query execution failed")),
                    0,
                ));
            }
            CloseReason::Cancelled => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{FutureExt, StreamExt};
    use std::pin::pin;

    fn doc(n: i64) -> Document {
        Document::new().with("n", n)
    }

    /// Pull every chunk that is ready right now
    fn drain<S: Stream<Item = Chunk> + Unpin>(body: &mut S) -> String {
        let mut out = String::new();
        while let Some(Some(chunk)) = body.next().now_or_never() {
            out.push_str(std::str::from_utf8(&chunk.unwrap()).unwrap());
        }
        out
    }

    #[test]
    fn test_bytes_ack_only_when_pulled() {
        let (mut sink, body) = chunk_queue(8);
        let mut body = pin!(body);

        assert_eq!(sink.write_query_result(&doc(1), false), 7);
        assert_eq!(sink.write_query_result(&doc(2), true), 9);
        sink.end(CloseReason::Completed);

        // Queued but not yet read by the body
        assert!(!sink.has_backlog());
        assert_eq!(sink.take_acked(), 0);

        assert_eq!(drain(&mut body), r#"[{"n":1},{"n":2}]"#);
        assert_eq!(sink.take_acked(), 16);
        assert_eq!(sink.take_acked(), 0);
    }

    #[test]
    fn test_each_pull_acks_its_own_bytes() {
        let (mut sink, body) = chunk_queue(8);
        let mut body = pin!(body);
        sink.write_query_result(&doc(1), false);
        sink.write_query_result(&doc(2), false);

        let open = body.next().now_or_never().flatten().unwrap().unwrap();
        assert_eq!(&open[..], b"[");
        assert_eq!(sink.take_acked(), 0);

        body.next().now_or_never().flatten().unwrap().unwrap();
        assert_eq!(sink.take_acked(), 7);
        body.next().now_or_never().flatten().unwrap().unwrap();
        assert_eq!(sink.take_acked(), 8);
    }

    #[test]
    fn test_empty_result_is_empty_array() {
        let (mut sink, body) = chunk_queue(8);
        let mut body = pin!(body);
        sink.end(CloseReason::Completed);
        drop(sink);
        assert_eq!(drain(&mut body), "[]");
    }

    #[tokio::test]
    async fn test_full_queue_backlogs_until_reserved() {
        // Room for "[" only
        let (mut sink, body) = chunk_queue(1);
        let mut body = pin!(body);
        let tx = sink.sender().clone();

        sink.write_query_result(&doc(1), false);
        sink.write_query_result(&doc(2), false);
        assert!(sink.has_backlog());

        assert_eq!(drain(&mut body), "[");
        assert_eq!(sink.take_acked(), 0);

        let permit = tx.reserve().await.unwrap();
        sink.send_backlog(permit);
        assert_eq!(sink.take_acked(), 0);
        assert_eq!(drain(&mut body), r#"{"n":1}"#);
        assert_eq!(sink.take_acked(), 7);

        let permit = tx.reserve().await.unwrap();
        sink.send_backlog(permit);
        assert!(!sink.has_backlog());
        assert_eq!(drain(&mut body), r#",{"n":2}"#);
        assert_eq!(sink.take_acked(), 8);
    }

    #[tokio::test]
    async fn test_pull_wakes_waiter() {
        let (mut sink, body) = chunk_queue(8);
        let mut body = pin!(body);
        let delivered = Arc::clone(sink.delivered());
        sink.write_query_result(&doc(1), false);

        drain(&mut body);
        tokio::time::timeout(std::time::Duration::from_secs(1), delivered.wait())
            .await
            .unwrap();
        assert_eq!(sink.take_acked(), 7);
    }

    #[test]
    fn test_failure_aborts_stream() {
        let (mut sink, body) = chunk_queue(8);
        let mut body = pin!(body);
        sink.write_query_result(&doc(1), false);
        sink.end(CloseReason::Failed);

        assert!(body.next().now_or_never().flatten().unwrap().is_ok());
        assert!(body.next().now_or_never().flatten().unwrap().is_ok());
        assert!(body.next().now_or_never().flatten().unwrap().is_err());
    }

    #[test]
    fn test_disconnected_receiver() {
        let (mut sink, body) = chunk_queue(8);
        drop(body);
        sink.write_query_result(&doc(1), false);
        assert!(sink.is_disconnected());
        assert!(!sink.has_backlog());
        assert_eq!(sink.take_acked(), 0);
    }
}
