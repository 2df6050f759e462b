//! # Document Cursors
//!
//! A cursor is a live, closable, pausable read over a binder.
//!
//! The cursor is owned by exactly one query execution and is only touched from
//! that execution's context. Delivery is pull-based: the execution asks for
//! the next document, and the cursor answers `None` whenever it is not
//! actively delivering (not started, paused, closed, or exhausted).
//!
//! ## State machine
//!
//! ```text
//! Created --start--> Running <--pause/resume--> Paused
//!    |                  |                          |
//!    +------close-------+----------close-----------+--> Closed
//! ```
//!
//! `Closed` is terminal: no document is ever delivered after `close`.

use std::fmt;
use std::sync::Arc;

use super::document::Document;
use super::errors::BinderResult;

/// Predicate a binder applies while selecting candidates
pub type MatchPredicate = Arc<dyn Fn(&Document) -> bool + Send + Sync>;

/// Predicate accepting every candidate
pub fn match_all() -> MatchPredicate {
    Arc::new(|_: &Document| true)
}

/// Delivery state of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Opened, not yet started
    Created,
    /// Actively delivering documents
    Running,
    /// Delivery suspended until resumed
    Paused,
    /// Terminal
    Closed,
}

impl CursorState {
    /// Apply `start`
    pub fn started(self) -> Self {
        match self {
            CursorState::Created => CursorState::Running,
            other => other,
        }
    }

    /// Apply `pause`
    pub fn paused(self) -> Self {
        match self {
            CursorState::Running => CursorState::Paused,
            other => other,
        }
    }

    /// Apply `resume`
    pub fn resumed(self) -> Self {
        match self {
            CursorState::Paused => CursorState::Running,
            other => other,
        }
    }
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorState::Created => write!(f, "created"),
            CursorState::Running => write!(f, "running"),
            CursorState::Paused => write!(f, "paused"),
            CursorState::Closed => write!(f, "closed"),
        }
    }
}

/// One delivered document
#[derive(Debug, Clone, PartialEq)]
pub struct CursorItem {
    /// The candidate document
    pub document: Document,
    /// Whether the cursor holds further candidates after this one
    pub has_more: bool,
}

impl CursorItem {
    /// Create a cursor item
    pub fn new(document: Document, has_more: bool) -> Self {
        Self { document, has_more }
    }
}

/// A pausable, closable read over a document store.
pub trait DocumentCursor {
    /// Begin delivery
    fn start(&mut self);

    /// Suspend delivery; `next_document` yields nothing until resumed
    fn pause(&mut self);

    /// Resume a paused cursor
    fn resume(&mut self);

    /// Close the cursor and release its resources
    fn close(&mut self);

    /// Next candidate, or `None` if the cursor is not delivering
    fn next_document(&mut self) -> BinderResult<Option<CursorItem>>;

    /// Whether undelivered candidates remain
    fn has_more(&self) -> bool;

    /// Current delivery state
    fn state(&self) -> CursorState;

    /// Whether the cursor has been closed
    fn is_closed(&self) -> bool {
        self.state() == CursorState::Closed
    }
}

impl<C: DocumentCursor + ?Sized> DocumentCursor for Box<C> {
    fn start(&mut self) {
        (**self).start()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn resume(&mut self) {
        (**self).resume()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn next_document(&mut self) -> BinderResult<Option<CursorItem>> {
        (**self).next_document()
    }

    fn has_more(&self) -> bool {
        (**self).has_more()
    }

    fn state(&self) -> CursorState {
        (**self).state()
    }
}
