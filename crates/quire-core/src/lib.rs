//! # quire-core
//!
//! Core types, traits, and abstractions for the quire note client.
//!
//! This crate provides the data model shared by every other quire crate,
//! the [`NotesGateway`] trait the state store talks to, the error type, and
//! the [`EventBus`] that carries store notifications to subscribers.
//!
//! ## Log Level Contract
//!
//! All quire crates log through `tracing` with `subsystem`, `component` and
//! `op` fields on instrumented operations.
//!
//! | Level | Usage |
//! |-------|-------|
//! | WARN  | Remote call failed, local state left untouched |
//! | INFO  | Lifecycle events, confirmed mutations |
//! | DEBUG | Decision points (superseded, missing, skipped saves) |
//! | TRACE | Per-item detail, event bus traffic |

pub mod defaults;
pub mod error;
pub mod events;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{EditTarget, EventBus, EventEnvelope, StoreEvent};
pub use models::*;
pub use traits::*;
