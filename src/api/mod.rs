//! API transport layer
//!
//! # Module Structure
//!
//! - [`transport`] - the [`Transport`] trait and structured transport failures
//! - [`http`] - HTTP implementation over reqwest
//!
//! # Example
//!
//! ```ignore
//! use apicache::api::{HttpTransport, Method, Transport};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let transport = HttpTransport::new("https://api.linode.com/v4", Some(token))?;
//!     let client = transport.request(Method::Get, "/account/clients/5", &[], None).await?;
//!     Ok(())
//! }
//! ```

pub mod http;
pub mod transport;

pub use http::HttpTransport;
pub use transport::{ApiErrors, Method, Transport, TransportError};
