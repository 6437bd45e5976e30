//! voyageur-core - Core library for Voyageur
//!
//! This crate contains the trip document model, the two-namespace
//! key/value storage adapter, the local mutation layer, the
//! last-writer-wins sync engine, and the join protocol shared by all
//! Voyageur interfaces.

pub mod error;
pub mod models;
pub mod state;
pub mod store;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Trip, TripId};
pub use state::TripSet;
pub use sync::{SyncConfig, SyncEngine, SyncStatus};
