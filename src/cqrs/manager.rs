//! # CQRS Manager
//!
//! Name-keyed registry of query definitions and command handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::binder::Document;
use crate::query::QueryDefinition;

use super::command::CommandHandler;
use super::errors::{CqrsError, CqrsResult};

/// Resolves names to registered queries and commands
#[derive(Default)]
pub struct CqrsManager {
    queries: RwLock<HashMap<String, Arc<QueryDefinition>>>,
    commands: RwLock<HashMap<String, Arc<dyn CommandHandler>>>,
}

impl CqrsManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query definition under its name
    pub fn register_query(&self, query: QueryDefinition) -> CqrsResult<Arc<QueryDefinition>> {
        let mut queries = self
            .queries
            .write()
            .map_err(|_| CqrsError::Internal("Lock poisoned".into()))?;
        let name = query.name().to_string();
        if queries.contains_key(&name) {
            return Err(CqrsError::AlreadyRegistered { kind: "Query", name });
        }
        let query = Arc::new(query);
        queries.insert(name, Arc::clone(&query));
        Ok(query)
    }

    /// Resolve a query by name
    pub fn resolve_query(&self, name: &str) -> CqrsResult<Arc<QueryDefinition>> {
        let queries = self
            .queries
            .read()
            .map_err(|_| CqrsError::Internal("Lock poisoned".into()))?;
        queries
            .get(name)
            .cloned()
            .ok_or_else(|| CqrsError::QueryNotFound(name.to_string()))
    }

    /// Register a command handler
    pub fn register_command<H>(&self, name: impl Into<String>, handler: H) -> CqrsResult<()>
    where
        H: CommandHandler + 'static,
    {
        let mut commands = self
            .commands
            .write()
            .map_err(|_| CqrsError::Internal("Lock poisoned".into()))?;
        let name = name.into();
        if commands.contains_key(&name) {
            return Err(CqrsError::AlreadyRegistered { kind: "Command", name });
        }
        commands.insert(name, Arc::new(handler));
        Ok(())
    }

    /// Whether a command is registered
    pub fn has_command(&self, name: &str) -> bool {
        self.commands
            .read()
            .map(|c| c.contains_key(name))
            .unwrap_or(false)
    }

    /// Invoke a command handler with the given payload
    pub async fn invoke_command(&self, name: &str, payload: Document) -> CqrsResult<()> {
        let handler = self.command_handler(name)?;
        handler.handle(payload).await
    }

    fn command_handler(&self, name: &str) -> CqrsResult<Arc<dyn CommandHandler>> {
        let commands = self
            .commands
            .read()
            .map_err(|_| CqrsError::Internal("Lock poisoned".into()))?;
        commands
            .get(name)
            .cloned()
            .ok_or_else(|| CqrsError::CommandNotFound(name.to_string()))
    }

    /// Registered query names, sorted
    pub fn list_queries(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .queries
            .read()
            .map(|q| q.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Registered command names, sorted
    pub fn list_commands(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl fmt::Debug for CqrsManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CqrsManager")
            .field("queries", &self.list_queries())
            .field("commands", &self.list_commands())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::binder::{Binder, MemoryBinder};

    fn binder() -> Arc<dyn Binder> {
        Arc::new(MemoryBinder::new("orders"))
    }

    #[test]
    fn test_register_and_resolve_query() {
        let manager = CqrsManager::new();
        manager
            .register_query(QueryDefinition::accept_all("all-orders", binder()))
            .unwrap();

        let query = manager.resolve_query("all-orders").unwrap();
        assert_eq!(query.name(), "all-orders");
        assert_eq!(manager.list_queries(), vec!["all-orders".to_string()]);
    }

    #[test]
    fn test_duplicate_query_rejected() {
        let manager = CqrsManager::new();
        manager
            .register_query(QueryDefinition::accept_all("q", binder()))
            .unwrap();
        let err = manager
            .register_query(QueryDefinition::accept_all("q", binder()))
            .unwrap_err();
        assert!(matches!(err, CqrsError::AlreadyRegistered { kind: "Query", .. }));
    }

    #[test]
    fn test_unknown_query() {
        let manager = CqrsManager::new();
        assert_eq!(
            manager.resolve_query("missing").unwrap_err(),
            CqrsError::QueryNotFound("missing".into())
        );
    }

    #[tokio::test]
    async fn test_invoke_command() {
        let manager = CqrsManager::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        manager
            .register_command("place", move |_payload: Document| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), CqrsError>(())
                }
            })
            .unwrap();

        manager.invoke_command("place", Document::new()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(manager.has_command("place"));
    }

    #[tokio::test]
    async fn test_invoke_unknown_command() {
        let manager = CqrsManager::new();
        let err = manager.invoke_command("nope", Document::new()).await.unwrap_err();
        assert_eq!(err, CqrsError::CommandNotFound("nope".into()));
    }

    #[tokio::test]
    async fn test_handler_failure_propagates() {
        let manager = CqrsManager::new();
        manager
            .register_command("fail", |_payload: Document| async {
                Err::<(), _>(CqrsError::handler_failure("fail", "rejected"))
            })
            .unwrap();
        let err = manager.invoke_command("fail", Document::new()).await.unwrap_err();
        assert!(matches!(err, CqrsError::HandlerFailure { .. }));
    }

    #[test]
    fn test_duplicate_command_rejected() {
        let manager = CqrsManager::new();
        let handler = |_payload: Document| async { Ok::<(), CqrsError>(()) };
        manager.register_command("c", handler).unwrap();
        assert!(manager.register_command("c", handler).is_err());
    }
}
