//! # Channel Log
//!
//! An append-only, ordered log of events. Sequence numbers start at 1 and
//! increase by one per append.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::binder::Document;

use super::errors::{ChannelError, ChannelResult};

/// One event appended to a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelEvent {
    /// Channel the event was appended to
    pub channel: String,
    /// Position in the channel, starting at 1
    pub sequence: u64,
    /// Append time
    pub timestamp: DateTime<Utc>,
    /// Event body
    pub payload: Document,
}

/// Append-only event log
#[derive(Debug)]
pub struct ChannelLog {
    name: String,
    events: RwLock<Vec<ChannelEvent>>,
}

impl ChannelLog {
    /// Create an empty channel
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: RwLock::new(Vec::new()),
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an event and return it with its assigned sequence number
    pub fn append(&self, payload: Document) -> ChannelResult<ChannelEvent> {
        let mut events = self
            .events
            .write()
            .map_err(|_| ChannelError::Internal("Lock poisoned".into()))?;
        let event = ChannelEvent {
            channel: self.name.clone(),
            sequence: events.len() as u64 + 1,
            timestamp: Utc::now(),
            payload,
        };
        events.push(event.clone());
        Ok(event)
    }

    /// Events with a sequence number of at least `sequence`
    pub fn read_from(&self, sequence: u64) -> ChannelResult<Vec<ChannelEvent>> {
        let events = self
            .events
            .read()
            .map_err(|_| ChannelError::Internal("Lock poisoned".into()))?;
        let skip = sequence.saturating_sub(1) as usize;
        Ok(events.iter().skip(skip).cloned().collect())
    }

    /// Sequence number of the most recent event, 0 if empty
    pub fn last_sequence(&self) -> u64 {
        self.events.read().map(|e| e.len() as u64).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequences_are_dense() {
        let log = ChannelLog::new("orders");
        let first = log.append(Document::new().with("n", 1)).unwrap();
        let second = log.append(Document::new().with("n", 2)).unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert!(second.timestamp >= first.timestamp);
        assert_eq!(log.last_sequence(), 2);
    }

    #[test]
    fn test_read_from() {
        let log = ChannelLog::new("orders");
        for n in 1..=5 {
            log.append(Document::new().with("n", n)).unwrap();
        }
        let tail = log.read_from(4).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, 4);
        assert_eq!(log.read_from(0).unwrap().len(), 5);
        assert!(log.read_from(9).unwrap().is_empty());
    }
}
