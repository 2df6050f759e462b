//! # Binder Registry

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::errors::{BinderError, BinderResult};
use super::memory::MemoryBinder;
use super::Binder;

/// Registry of binders by name
#[derive(Debug, Default)]
pub struct BinderRegistry {
    binders: RwLock<BTreeMap<String, Arc<dyn Binder>>>,
}

impl BinderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register an in-memory binder
    pub fn create(&self, name: &str) -> BinderResult<Arc<dyn Binder>> {
        let binder: Arc<dyn Binder> = Arc::new(MemoryBinder::new(name));
        self.register(Arc::clone(&binder))?;
        Ok(binder)
    }

    /// Register an existing binder under its own name
    pub fn register(&self, binder: Arc<dyn Binder>) -> BinderResult<()> {
        let mut binders = self
            .binders
            .write()
            .map_err(|_| BinderError::Internal("Lock poisoned".into()))?;
        let name = binder.name().to_string();
        if binders.contains_key(&name) {
            return Err(BinderError::AlreadyExists(name));
        }
        binders.insert(name, binder);
        Ok(())
    }

    /// Get a binder by name
    pub fn get(&self, name: &str) -> BinderResult<Arc<dyn Binder>> {
        let binders = self
            .binders
            .read()
            .map_err(|_| BinderError::Internal("Lock poisoned".into()))?;
        binders
            .get(name)
            .cloned()
            .ok_or_else(|| BinderError::NotFound(name.to_string()))
    }

    /// Names of all binders, sorted
    pub fn list(&self) -> Vec<String> {
        self.binders
            .read()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let registry = BinderRegistry::new();
        registry.create("orders").unwrap();
        assert_eq!(registry.get("orders").unwrap().name(), "orders");
        assert_eq!(registry.list(), vec!["orders".to_string()]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = BinderRegistry::new();
        registry.create("orders").unwrap();
        assert!(matches!(
            registry.create("orders"),
            Err(BinderError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_unknown_binder() {
        let registry = BinderRegistry::new();
        assert!(matches!(registry.get("nope"), Err(BinderError::NotFound(_))));
    }
}
