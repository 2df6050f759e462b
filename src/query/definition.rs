//! # Query Definitions
//!
//! A definition is the immutable (name, binder, filter, completion) tuple a
//! query is registered under. It is shared by reference across every
//! concurrent execution and never mutated by any of them; all per-invocation
//! state lives in the [`QueryContext`].

use std::fmt;
use std::sync::Arc;

use crate::binder::{Binder, Document};

use super::context::QueryContext;
use super::errors::FilterResult;

/// Decides whether a document belongs in the result stream
pub type DocumentFilter =
    Arc<dyn Fn(&Document, &mut QueryContext) -> FilterResult<bool> + Send + Sync>;

/// Decides, after a document is accepted, whether the stream is complete
pub type CompletionPredicate = Arc<dyn Fn(&QueryContext) -> bool + Send + Sync>;

/// A registered query
#[derive(Clone)]
pub struct QueryDefinition {
    name: String,
    binder: Arc<dyn Binder>,
    filter: DocumentFilter,
    completion: Option<CompletionPredicate>,
}

impl QueryDefinition {
    /// Create a query over `binder` with the given document filter
    pub fn new<F>(name: impl Into<String>, binder: Arc<dyn Binder>, filter: F) -> Self
    where
        F: Fn(&Document, &mut QueryContext) -> FilterResult<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            binder,
            filter: Arc::new(filter),
            completion: None,
        }
    }

    /// Create a query that accepts every document in `binder`
    pub fn accept_all(name: impl Into<String>, binder: Arc<dyn Binder>) -> Self {
        Self::new(name, binder, |_, _| Ok(true))
    }

    /// Gate the stream on context state after each accepted document
    pub fn with_completion<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&QueryContext) -> bool + Send + Sync + 'static,
    {
        self.completion = Some(Arc::new(predicate));
        self
    }

    /// Stop the stream after `limit` accepted documents
    pub fn with_limit(self, limit: u64) -> Self {
        self.with_completion(move |ctx| ctx.accepted() >= limit)
    }

    /// Query name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target binder
    pub fn binder(&self) -> &Arc<dyn Binder> {
        &self.binder
    }

    /// Run the filter, then the completion predicate if the document was accepted
    pub fn evaluate(&self, document: &Document, ctx: &mut QueryContext) -> FilterResult<bool> {
        let accepted = (self.filter)(document, ctx)?;
        if accepted {
            ctx.record_accepted();
            if let Some(completion) = &self.completion {
                if completion(ctx) {
                    ctx.mark_complete();
                }
            }
        }
        Ok(accepted)
    }
}

impl fmt::Debug for QueryDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryDefinition")
            .field("name", &self.name)
            .field("binder", &self.binder.name())
            .field("completion", &self.completion.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::MemoryBinder;
    use crate::query::FilterError;

    fn binder() -> Arc<dyn Binder> {
        Arc::new(MemoryBinder::new("items"))
    }

    #[test]
    fn test_limit_marks_complete() {
        let query = QueryDefinition::accept_all("all", binder()).with_limit(2);
        let mut ctx = QueryContext::default();
        let doc = Document::new();

        assert!(query.evaluate(&doc, &mut ctx).unwrap());
        assert!(!ctx.is_complete());
        assert!(query.evaluate(&doc, &mut ctx).unwrap());
        assert!(ctx.is_complete());
    }

    #[test]
    fn test_rejected_documents_not_counted() {
        let query = QueryDefinition::new("none", binder(), |_, _| Ok(false)).with_limit(1);
        let mut ctx = QueryContext::default();
        assert!(!query.evaluate(&Document::new(), &mut ctx).unwrap());
        assert_eq!(ctx.accepted(), 0);
        assert!(!ctx.is_complete());
    }

    #[test]
    fn test_filter_error_propagates() {
        let query = QueryDefinition::new("broken", binder(), |_, _| {
            Err(FilterError::Failed("bad".into()))
        });
        let mut ctx = QueryContext::default();
        assert!(query.evaluate(&Document::new(), &mut ctx).is_err());
    }

    #[test]
    fn test_filter_can_request_completion() {
        let query = QueryDefinition::new("first-big", binder(), |doc, ctx| {
            let big = doc.get("n").and_then(|v| v.as_i64()).unwrap_or(0) > 10;
            if big {
                ctx.mark_complete();
            }
            Ok(true)
        });
        let mut ctx = QueryContext::default();
        query.evaluate(&Document::new().with("n", 3), &mut ctx).unwrap();
        assert!(!ctx.is_complete());
        query.evaluate(&Document::new().with("n", 30), &mut ctx).unwrap();
        assert!(ctx.is_complete());
    }
}
