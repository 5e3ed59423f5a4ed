//! Declarative REST resources backed by a normalized client-side cache.
//!
//! Describe a resource once ([`resource::configure`] or the embedded
//! [`resource::Registry`]); generate its actions ([`resource::generate_actions`])
//! and its reducer ([`cache::generate_reducer`]); run actions through a
//! [`store::Store`] and read the resulting [`cache::CacheSlice`]s.
//!
//! # Module Structure
//!
//! - [`resource`] - Resource Config, endpoint templates, registry, actions
//! - [`cache`] - cache state, lifecycle events, reducer
//! - [`store`] - store composition and the dispatch adapter
//! - [`context`] - explicit context bundling store, transport and resources
//! - [`api`] - transport trait and HTTP implementation
//! - [`config`] - persistent user configuration
//! - [`error`] - configuration errors

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod resource;
pub mod store;

pub use context::ApiContext;
pub use error::ConfigurationError;
pub use store::{Dispatch, StateTree, Store, Task, TaskFailure, TaskOutcome};
