//! Key/value storage adapter for private and shared namespaces

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::future::Future;

use crate::error::Result;
use crate::models::TripId;

/// Key prefix for shared trip records, enumerable for the join protocol
pub const TRIP_KEY_PREFIX: &str = "trip:";

/// Private-namespace key holding the whole local trip collection
pub const SNAPSHOT_KEY: &str = "trips";

/// Shared-namespace key for a trip record
#[must_use]
pub fn trip_key(id: TripId) -> String {
    format!("{TRIP_KEY_PREFIX}{id}")
}

/// Logical namespace a key lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Per-device data, never visible to other clients
    Private,
    /// Data visible to any client holding the key
    Shared,
}

impl Namespace {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Shared => "shared",
        }
    }
}

/// Uniform asynchronous interface over the two storage namespaces.
///
/// Backends report every failure (I/O, SQL, serialization, quota) as a
/// typed `Err` value and must never panic; the sync engine is the layer
/// that absorbs these errors into per-trip status. Callers never branch
/// on which backend is behind the trait.
pub trait KvStore: Send + Sync + 'static {
    /// Fetch a value, `Ok(None)` when the key is absent
    fn get(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Write a value, replacing any previous one
    fn set(
        &self,
        namespace: Namespace,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove a key; removing an absent key is not an error
    fn delete(&self, namespace: Namespace, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// List all keys in the namespace starting with `prefix`, sorted
    fn list_keys(
        &self,
        namespace: Namespace,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;
}
