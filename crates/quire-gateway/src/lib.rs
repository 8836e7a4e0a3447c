//! # quire-gateway
//!
//! Remote gateway for the quire notes server.
//!
//! This crate provides:
//! - [`HttpGateway`], the reqwest-backed implementation of
//!   [`quire_core::NotesGateway`] (one method per REST endpoint)
//! - [`ApiConfig`], loaded from environment variables or a config section
//! - `MockGateway` (feature `mock`), an in-memory server double with a call
//!   log, per-operation failure injection and simulated latency
//!
//! # Example
//!
//! ```rust,no_run
//! use quire_gateway::HttpGateway;
//! use quire_core::NotesGateway;
//!
//! #[tokio::main]
//! async fn main() -> quire_core::Result<()> {
//!     let gateway = HttpGateway::from_env()?;
//!     for folder in gateway.list_folders().await? {
//!         println!("{} {}", folder.id, folder.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod http;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use quire_core::*;

pub use config::{substitute_env_vars, ApiConfig, ConfigError, ConfigResult};
pub use http::HttpGateway;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCall, MockGateway};
