//! Resource scopes
//!
//! A scope is a typed bag of shared resources (a photo session, a model
//! handle) that enrichers and stop conditions can look up by type. Runs get
//! a fresh scope from a [`ScopeFactory`] unless the caller supplies one.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Default)]
pub struct ResourceScope {
    resources: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resource, replacing any earlier one of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, resource: T) {
        self.resources.insert(TypeId::of::<T>(), Arc::new(resource));
    }

    pub fn with<T: Any + Send + Sync>(mut self, resource: T) -> Self {
        self.insert(resource);
        self
    }

    /// Attempt to look up a resource by type.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resources
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|r| r.downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceScope")
            .field("resources", &self.resources.len())
            .finish()
    }
}

/// Creates the isolated scope for one run.
pub trait ScopeFactory: Send + Sync {
    fn create_scope(&self) -> ResourceScope;
}

impl<F> ScopeFactory for F
where
    F: Fn() -> ResourceScope + Send + Sync,
{
    fn create_scope(&self) -> ResourceScope {
        self()
    }
}

/// Factory producing empty scopes
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyScopeFactory;

impl ScopeFactory for EmptyScopeFactory {
    fn create_scope(&self) -> ResourceScope {
        ResourceScope::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct ModelHandle(&'static str);

    #[test]
    fn get_by_type() {
        let scope = ResourceScope::new().with(ModelHandle("onnx")).with(42u32);

        assert_eq!(*scope.get::<ModelHandle>().unwrap(), ModelHandle("onnx"));
        assert_eq!(*scope.get::<u32>().unwrap(), 42);
        assert!(scope.get::<String>().is_none());
        assert_eq!(scope.len(), 2);
    }

    #[test]
    fn closure_factory_builds_fresh_scopes() {
        let factory = || ResourceScope::new().with(ModelHandle("fresh"));
        let a = factory.create_scope();
        let b = factory.create_scope();

        assert!(!Arc::ptr_eq(&a.get::<ModelHandle>().unwrap(), &b.get::<ModelHandle>().unwrap()));
        assert!(EmptyScopeFactory.create_scope().is_empty());
    }
}
