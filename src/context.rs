//! Explicit context passed to anything that reads the cache or dispatches
//! actions, instead of a process-wide store.

use crate::api::Transport;
use crate::cache::CacheSlice;
use crate::error::ConfigurationError;
use crate::resource::{generate_actions, Registry, ResourceActions, ResourceConfig};
use crate::store::{StateTree, Store, Task, TaskOutcome};
use std::sync::Arc;

/// Store, transport and the known resources, bundled together
#[derive(Clone)]
pub struct ApiContext {
    store: Store,
    transport: Arc<dyn Transport>,
    registry: Registry,
}

impl ApiContext {
    /// Build a context and register every top-level resource of `registry`
    pub fn new(registry: Registry, transport: Arc<dyn Transport>) -> Result<Self, ConfigurationError> {
        let store = Store::new();
        for config in registry.iter() {
            store.register(Arc::clone(config))?;
        }
        Ok(Self {
            store,
            transport,
            registry,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve a resource path (`linodes/backups`)
    pub fn resource(&self, path: &str) -> Result<&Arc<ResourceConfig>, ConfigurationError> {
        self.registry
            .resolve(path)
            .ok_or_else(|| ConfigurationError::UnknownResource(path.to_string()))
    }

    /// Actions for a resource path, bound to this context's transport
    pub fn actions(&self, path: &str) -> Result<ResourceActions, ConfigurationError> {
        let config = self.resource(path)?;
        Ok(generate_actions(Arc::clone(config), Arc::clone(&self.transport)))
    }

    pub async fn dispatch(&self, task: Task) -> TaskOutcome {
        self.store.dispatch(task).await
    }

    pub fn state(&self) -> StateTree {
        self.store.state()
    }

    pub fn slice(&self, plural: &str) -> Option<CacheSlice> {
        self.store.slice(plural)
    }
}
