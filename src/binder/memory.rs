//! # In-Memory Binder
//!
//! Documents are kept ordered by id in a map shared through an `Arc`. Opening
//! a cursor takes a reference to the current map, not a copy of it. A write
//! while any cursor still holds that map clones it once (`Arc::make_mut`), so
//! in-flight queries keep reading the map they opened on.
//!
//! Cursors walk their map lazily: each read clones one document, found by a
//! range scan past the last delivered id.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::{Arc, RwLock};

use futures_util::future::{self, BoxFuture, FutureExt};

use super::cursor::{CursorItem, CursorState, DocumentCursor, MatchPredicate};
use super::document::Document;
use super::errors::{BinderError, BinderResult};
use super::Binder;

type DocumentMap = BTreeMap<String, Document>;

/// Binder backed by an ordered in-memory map
#[derive(Debug)]
pub struct MemoryBinder {
    name: String,
    documents: RwLock<Arc<DocumentMap>>,
}

impl MemoryBinder {
    /// Create an empty binder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(Arc::new(BTreeMap::new())),
        }
    }

    fn lock_poisoned() -> BinderError {
        BinderError::Internal("Lock poisoned".into())
    }
}

impl Binder for MemoryBinder {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_matching(&self, predicate: MatchPredicate) -> Box<dyn DocumentCursor> {
        let cursor = match self.documents.read() {
            Ok(documents) => MemoryCursor::over(Arc::clone(&documents), predicate),
            Err(_) => MemoryCursor::failed(Self::lock_poisoned()),
        };
        Box::new(cursor)
    }

    fn get(&self, id: &str) -> BoxFuture<'static, BinderResult<Option<Document>>> {
        let result = self
            .documents
            .read()
            .map(|documents| documents.get(id).cloned())
            .map_err(|_| Self::lock_poisoned());
        future::ready(result).boxed()
    }

    fn put(&self, id: &str, document: Document) -> BinderResult<()> {
        let mut documents = self.documents.write().map_err(|_| Self::lock_poisoned())?;
        Arc::make_mut(&mut documents).insert(id.to_string(), document);
        Ok(())
    }

    fn delete(&self, id: &str) -> BinderResult<bool> {
        let mut documents = self.documents.write().map_err(|_| Self::lock_poisoned())?;
        if !documents.contains_key(id) {
            return Ok(false);
        }
        Ok(Arc::make_mut(&mut documents).remove(id).is_some())
    }

    fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }
}

/// Lazy cursor over a shared, immutable document map.
///
/// `next` is the id of the next matching document, found one step ahead so
/// every delivered item knows whether more follow.
pub struct MemoryCursor {
    documents: Arc<DocumentMap>,
    predicate: MatchPredicate,
    next: Option<String>,
    state: CursorState,
    /// Deferred failure surfaced on the first read
    failure: Option<BinderError>,
}

impl MemoryCursor {
    /// Create a cursor over the given documents, delivered in order
    pub fn new(documents: impl IntoIterator<Item = Document>) -> Self {
        let map = documents
            .into_iter()
            .enumerate()
            .map(|(i, doc)| (format!("{i:020}"), doc))
            .collect();
        Self::over(Arc::new(map), super::cursor::match_all())
    }

    fn over(documents: Arc<DocumentMap>, predicate: MatchPredicate) -> Self {
        let mut cursor = Self {
            documents,
            predicate,
            next: None,
            state: CursorState::Created,
            failure: None,
        };
        cursor.next = cursor.seek(None);
        cursor
    }

    fn failed(error: BinderError) -> Self {
        Self {
            documents: Arc::new(BTreeMap::new()),
            predicate: super::cursor::match_all(),
            next: None,
            state: CursorState::Created,
            failure: Some(error),
        }
    }

    /// First matching id strictly after `after`
    fn seek(&self, after: Option<&str>) -> Option<String> {
        let range = match after {
            Some(id) => self.documents.range::<str, _>((Excluded(id), Unbounded)),
            None => self.documents.range::<str, _>((Unbounded, Unbounded)),
        };
        let predicate = &self.predicate;
        range
            .filter(|(_, doc)| predicate(*doc))
            .map(|(id, _)| id.clone())
            .next()
    }
}

impl fmt::Debug for MemoryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCursor")
            .field("next", &self.next)
            .field("state", &self.state)
            .finish()
    }
}

impl DocumentCursor for MemoryCursor {
    fn start(&mut self) {
        self.state = self.state.started();
    }

    fn pause(&mut self) {
        self.state = self.state.paused();
    }

    fn resume(&mut self) {
        self.state = self.state.resumed();
    }

    fn close(&mut self) {
        self.state = CursorState::Closed;
        self.next = None;
        self.documents = Arc::new(BTreeMap::new());
    }

    fn next_document(&mut self) -> BinderResult<Option<CursorItem>> {
        if self.state != CursorState::Running {
            return Ok(None);
        }
        if let Some(e) = self.failure.take() {
            return Err(BinderError::LookupFailed(e.to_string()));
        }
        let Some(id) = self.next.take() else {
            return Ok(None);
        };
        let document = self
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| BinderError::Internal(format!("cursor lost document {id}")))?;
        self.next = self.seek(Some(&id));
        Ok(Some(CursorItem::new(document, self.next.is_some())))
    }

    fn has_more(&self) -> bool {
        self.state != CursorState::Closed && (self.next.is_some() || self.failure.is_some())
    }

    fn state(&self) -> CursorState {
        self.state
    }
}
