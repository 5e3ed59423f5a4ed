//! Resource abstraction layer
//!
//! A resource is described once, declaratively, and everything else is
//! generated from that description.
//!
//! # Architecture
//!
//! - [`config`] - validated Resource Config ([`configure`])
//! - [`endpoint`] - endpoint templates mapping ids to API paths
//! - `registry` - Linode API resources loaded from embedded JSON
//! - [`actions`] - the Action Generator ([`generate_actions`])
//!
//! The matching reducer lives in [`crate::cache::reducer`].
//!
//! # Example
//!
//! ```ignore
//! use apicache::resource::{configure, generate_actions, EndpointTemplate, ResourceOptions, SupportedOp};
//!
//! let clients = Arc::new(configure(
//!     ResourceOptions::new("client", "clients")
//!         .endpoint(EndpointTemplate::pattern("/account/clients/{id}")?)
//!         .supports(&[SupportedOp::Single, SupportedOp::Collection]),
//! )?);
//! store.register(clients.clone())?;
//! let actions = generate_actions(clients, transport);
//! store.dispatch(actions.fetch_one(5u64, &[])?).await;
//! ```

pub mod actions;
pub mod config;
pub mod endpoint;
mod registry;

pub use actions::{generate_actions, ResourceActions};
pub use config::{configure, EntityAction, OpSet, ResourceConfig, ResourceOptions, SupportedOp};
pub use endpoint::EndpointTemplate;
pub use registry::*;
