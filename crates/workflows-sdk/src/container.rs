//! Service container handed to steps.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ContainerError;

/// Opaque lookup of domain services keyed by a service identifier.
///
/// The engine never inspects what is registered; it only hands the container
/// to steps so they can resolve the modules they operate on.
///
/// ```
/// use std::sync::Arc;
/// use workflows_sdk::Container;
///
/// let container = Container::new().with("greeting", Arc::new(String::from("hi")));
/// let greeting: Arc<String> = container.resolve("greeting").unwrap();
/// assert_eq!(greeting.as_str(), "hi");
/// ```
#[derive(Clone, Default)]
pub struct Container {
    services: Arc<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Container {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service under a key, replacing any previous one.
    pub fn register<T>(&mut self, key: impl Into<String>, service: T)
    where
        T: Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.services).insert(key.into(), Arc::new(service));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T>(mut self, key: impl Into<String>, service: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.register(key, service);
        self
    }

    /// Resolves a service by key.
    ///
    /// Services are typically registered as `Arc<dyn Trait>` and resolved
    /// with the same type.
    pub fn resolve<T>(&self, key: &str) -> Result<T, ContainerError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let service = self
            .services
            .get(key)
            .ok_or_else(|| ContainerError::ServiceNotFound(key.to_string()))?;

        service
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ContainerError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Returns true if a service is registered under the key.
    pub fn contains(&self, key: &str) -> bool {
        self.services.contains_key(key)
    }

    /// Returns the registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.services.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.keys())
            .finish()
    }
}
