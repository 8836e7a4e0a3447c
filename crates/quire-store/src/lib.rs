//! # quire-store
//!
//! Client-side state synchronization for quire.
//!
//! This crate provides:
//! - [`Store`], the single owner of folders, notes, deleted notes and
//!   selection; every mutation goes through a gateway call and is applied
//!   from the confirmed result
//! - [`Selection`], the state machine keeping the open note and the selected
//!   folder consistent as collections change
//! - [`AutosaveScheduler`], per-target debounced persistence of editor
//!   content
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quire_gateway::HttpGateway;
//! use quire_store::{AutosaveConfig, AutosaveScheduler, Store};
//! use quire_core::EditTarget;
//!
//! let store = Store::new(Arc::new(HttpGateway::from_env()?));
//! store.load_folders().await;
//! store.select_folder(Some("inbox")).await;
//!
//! let autosave = AutosaveScheduler::new(store.clone(), AutosaveConfig::from_env());
//! autosave.on_change(EditTarget::Draft, "first line");
//!
//! let mut events = store.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event.payload);
//! }
//! ```

pub mod autosave;
pub mod guard;
pub mod outcome;
pub mod selection;
pub mod store;

// Re-export core types
pub use quire_core::*;

pub use autosave::{AutosaveConfig, AutosaveScheduler};
pub use guard::InFlightGuard;
pub use outcome::Outcome;
pub use selection::Selection;
pub use store::{Store, StoreState};
