//! # Binders
//!
//! A binder is a queryable document store materialized from channel events.
//!
//! The query engine only ever sees a binder through two seams:
//!
//! - [`Binder::get_matching`] opens a [`DocumentCursor`] over the store
//! - [`Binder::get`] looks a single document up by id
//!
//! [`MemoryBinder`] is the in-process implementation used by the platform.

mod cursor;
mod document;
mod errors;
mod memory;
mod registry;

pub use cursor::{match_all, CursorItem, CursorState, DocumentCursor, MatchPredicate};
pub use document::Document;
pub use errors::{BinderError, BinderResult};
pub use memory::{MemoryBinder, MemoryCursor};
pub use registry::BinderRegistry;

use std::fmt;

use futures_util::future::BoxFuture;

/// A named document store.
pub trait Binder: Send + Sync + fmt::Debug {
    /// Binder name, unique within a [`BinderRegistry`]
    fn name(&self) -> &str;

    /// Open a cursor over every document accepted by `predicate`.
    ///
    /// The cursor is idle until [`DocumentCursor::start`] is called.
    fn get_matching(&self, predicate: MatchPredicate) -> Box<dyn DocumentCursor>;

    /// Look up a document by id
    fn get(&self, id: &str) -> BoxFuture<'static, BinderResult<Option<Document>>>;

    /// Insert or replace the document stored under `id`
    fn put(&self, id: &str, document: Document) -> BinderResult<()>;

    /// Remove the document stored under `id`, returning whether it existed
    fn delete(&self, id: &str) -> BinderResult<bool>;

    /// Number of stored documents
    fn len(&self) -> usize;

    /// Check if the binder holds no documents
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
