//! Store composition and the dispatch adapter
//!
//! The [`Store`] holds one [`CacheSlice`] per registered top-level resource,
//! keyed by plural name. Events are applied one at a time: the reducer runs
//! to completion under the store lock before the next event is accepted, so
//! events land in emission order and reducers never see concurrent state.
//!
//! Generated actions are [`Task`]s. Running a task hands it a [`Dispatch`]
//! handle to emit events and read the current tree.

use crate::cache::{generate_reducer, CacheSlice, Event, ErrorMap, ResourceReducer};
use crate::error::ConfigurationError;
use crate::resource::ResourceConfig;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

/// Global state: one slice per top-level resource
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StateTree(BTreeMap<String, CacheSlice>);

impl StateTree {
    pub fn slice(&self, plural: &str) -> Option<&CacheSlice> {
        self.0.get(plural)
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// What a task sees of the store
pub trait Dispatch: Send + Sync {
    /// Feed one event into the store
    fn emit(&self, event: Event);

    /// Snapshot of the current tree
    fn state(&self) -> StateTree;
}

/// Why a task failed; the same errors were already written to the cache
#[derive(Debug, Clone, thiserror::Error)]
#[error("{source}")]
pub struct TaskFailure {
    pub errors: ErrorMap,
    #[source]
    pub source: crate::api::TransportError,
}

/// Result of running a task. Failures are values, never panics or
/// rejections.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed(Value),
    Failed(TaskFailure),
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Opt in to handling the failure as an error
    pub fn into_result(self) -> Result<Value, TaskFailure> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(failure) => Err(failure),
        }
    }
}

type TaskFn = Box<dyn FnOnce(Arc<dyn Dispatch>) -> BoxFuture<'static, TaskOutcome> + Send>;

/// An asynchronous unit of work accepted by [`Store::dispatch`]
pub struct Task {
    label: String,
    run: TaskFn,
}

impl Task {
    pub fn new<F, Fut>(label: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(Arc<dyn Dispatch>) -> Fut + Send + 'static,
        Fut: Future<Output = TaskOutcome> + Send + 'static,
    {
        Self {
            label: label.into(),
            run: Box::new(move |dispatch| Box::pin(f(dispatch))),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run against any dispatch handle
    pub async fn run(self, dispatch: Arc<dyn Dispatch>) -> TaskOutcome {
        (self.run)(dispatch).await
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("label", &self.label).finish()
    }
}

#[derive(Default)]
struct Inner {
    tree: StateTree,
    reducers: BTreeMap<String, ResourceReducer>,
}

/// Cloneable handle to the global state tree
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<Inner>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Slices are only replaced once their reducer returns, so a poisoned
        // lock still guards a complete tree
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a top-level resource and create its empty slice. Registering
    /// the same plural name again replaces the reducer but keeps the slice.
    pub fn register(&self, config: Arc<ResourceConfig>) -> Result<(), ConfigurationError> {
        config.validate_top_level()?;
        let plural = config.plural_name().to_string();
        let mut inner = self.lock();
        inner.tree.0.entry(plural.clone()).or_default();
        inner
            .reducers
            .insert(plural.clone(), generate_reducer(config));
        tracing::debug!("registered resource {}", plural);
        Ok(())
    }

    pub fn is_registered(&self, plural: &str) -> bool {
        self.lock().reducers.contains_key(plural)
    }

    /// Apply one event. Events for unregistered resources are dropped.
    pub fn apply(&self, event: &Event) {
        let mut inner = self.lock();
        let Inner { tree, reducers } = &mut *inner;
        let Some(reducer) = reducers.get(event.address.root()) else {
            tracing::debug!("no reducer for {}, dropping {}", event.address, event.kind());
            return;
        };
        let slot = tree.0.entry(reducer.resource().to_string()).or_default();
        *slot = reducer.reduce(slot.clone(), event);
    }

    pub fn state(&self) -> StateTree {
        self.lock().tree.clone()
    }

    pub fn slice(&self, plural: &str) -> Option<CacheSlice> {
        self.lock().tree.slice(plural).cloned()
    }

    /// Run a task against this store
    pub async fn dispatch(&self, task: Task) -> TaskOutcome {
        tracing::debug!("dispatching {}", task.label());
        let outcome = task.run(Arc::new(self.clone())).await;
        if let TaskOutcome::Failed(failure) = &outcome {
            tracing::warn!("task failed: {}", failure);
        }
        outcome
    }
}

impl Dispatch for Store {
    fn emit(&self, event: Event) {
        self.apply(&event);
    }

    fn state(&self) -> StateTree {
        Store::state(self)
    }
}
