//! # Command Handlers
//!
//! A command handler receives the whole request payload and completes
//! asynchronously. Any `Fn(Document) -> impl Future<Output = CqrsResult<()>>`
//! closure is a handler.

use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::binder::Document;

use super::errors::CqrsResult;

/// Handles one named command
pub trait CommandHandler: Send + Sync {
    /// Handle a command payload
    fn handle(&self, payload: Document) -> BoxFuture<'static, CqrsResult<()>>;
}

impl<F, Fut> CommandHandler for F
where
    F: Fn(Document) -> Fut + Send + Sync,
    Fut: Future<Output = CqrsResult<()>> + Send + 'static,
{
    fn handle(&self, payload: Document) -> BoxFuture<'static, CqrsResult<()>> {
        (self)(payload).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cqrs::CqrsError;

    #[tokio::test]
    async fn test_closure_is_handler() {
        let handler = |payload: Document| async move {
            match payload.get_str("sku") {
                Some(_) => Ok(()),
                None => Err(CqrsError::handler_failure("add", "missing sku")),
            }
        };

        assert!(handler.handle(Document::new().with("sku", "a1")).await.is_ok());
        assert!(handler.handle(Document::new()).await.is_err());
    }
}
