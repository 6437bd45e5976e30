//! Sync engine: push, pull, polling cadence, and debounced auto-push.
//!
//! Every share-linked trip has one record in the shared namespace. Push
//! writes the full local document with a refreshed revision; pull fetches
//! the shared copy and resolves divergence with whole-document
//! last-writer-wins keyed by the revision stamp. Conflicts are never
//! surfaced as errors: the higher revision silently wins. Storage
//! failures stop here, converted into per-trip status, and never
//! propagate into the mutation layer or its callers.

mod join;

pub use join::normalize_code;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{
    DayId, ItemCategory, ItemId, PackId, PackingCategory, Trip, TripId,
};
use crate::state::{DayPatch, ItemPatch, PackingPatch, TripPatch, TripSet};
use crate::store::{trip_key, KvStore, Namespace, SNAPSHOT_KEY, TRIP_KEY_PREFIX};

/// Which side survives a last-writer-wins comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

/// Pure LWW resolution over two whole documents: the remote copy wins
/// only when its revision is strictly greater. Usable without any I/O.
#[must_use]
pub fn resolve(local: &Trip, remote: &Trip) -> Winner {
    if remote.revision > local.revision {
        Winner::Remote
    } else {
        Winner::Local
    }
}

/// Per-trip sync health shown by presentation layers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Ok,
    Error,
}

/// Cadence settings for the engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Fixed interval between polling rounds
    pub poll_interval: Duration,
    /// Quiescence window before a mutation-triggered push fires
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(45),
            debounce: Duration::from_secs(2),
        }
    }
}

/// Orchestrates local state, the private snapshot, and the shared
/// namespace for one client.
///
/// Cheap to clone (Arc'd interior); must be used inside a tokio runtime
/// since mutations spawn persistence and debounce tasks. Locks are never
/// held across await points.
pub struct SyncEngine<S> {
    store: Arc<S>,
    trips: Arc<Mutex<TripSet>>,
    status: Arc<Mutex<HashMap<TripId, SyncStatus>>>,
    pending: Arc<Mutex<HashMap<TripId, JoinHandle<()>>>>,
    config: SyncConfig,
}

impl<S> Clone for SyncEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            trips: Arc::clone(&self.trips),
            status: Arc::clone(&self.status),
            pending: Arc::clone(&self.pending),
            config: self.config.clone(),
        }
    }
}

impl<S: KvStore> SyncEngine<S> {
    /// Create an engine over the given store with default cadence
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, SyncConfig::default())
    }

    /// Create an engine with custom cadence (tests use short windows)
    #[must_use]
    pub fn with_config(store: Arc<S>, config: SyncConfig) -> Self {
        Self {
            store,
            trips: Arc::new(Mutex::new(TripSet::new())),
            status: Arc::new(Mutex::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    fn with_trips<R>(&self, f: impl FnOnce(&mut TripSet) -> R) -> R {
        let mut guard = self.trips.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<TripId, JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, id: TripId, status: SyncStatus) {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, status);
    }

    /// Per-trip sync status, `Idle` until the first sync action
    #[must_use]
    pub fn status(&self, id: TripId) -> SyncStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
            .unwrap_or_default()
    }

    // ===== Snapshot persistence (private namespace) =====

    /// Load the private snapshot into memory; returns how many trips
    /// were restored. Called once at startup, before the first poll.
    pub async fn load(&self) -> Result<usize> {
        let Some(raw) = self.store.get(Namespace::Private, SNAPSHOT_KEY).await? else {
            return Ok(0);
        };
        let trips: Vec<Trip> = serde_json::from_str(&raw)?;
        let count = trips.len();
        self.with_trips(|set| set.replace_all(trips));
        Ok(count)
    }

    /// Write the whole local collection to the private namespace
    pub async fn persist(&self) -> Result<()> {
        let snapshot = self.with_trips(|trips| trips.snapshot());
        let payload = serde_json::to_string(&snapshot)?;
        self.store
            .set(Namespace::Private, SNAPSHOT_KEY, &payload)
            .await
    }

    /// Fire-and-forget persistence; failure is logged, never surfaced,
    /// and the in-memory state stays authoritative.
    fn persist_in_background(&self) {
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(error) = engine.persist().await {
                warn!(%error, "failed to persist local snapshot");
            }
        });
    }

    // ===== Reads =====

    #[must_use]
    pub fn get(&self, id: TripId) -> Option<Trip> {
        self.with_trips(|set| set.get(id).cloned())
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Trip> {
        self.with_trips(|trips| trips.snapshot())
    }

    // ===== Mutation entry points =====
    //
    // Each applies synchronously in memory (infallible), then persists
    // and, for a share-linked trip, schedules the debounced push.

    pub fn create_trip(&self, name: impl Into<String>) -> TripId {
        let id = self.with_trips(|set| set.create_trip(name));
        self.persist_in_background();
        id
    }

    pub fn update_trip(&self, id: TripId, patch: TripPatch) {
        if self.with_trips(|set| set.update_trip(id, patch)) {
            self.after_mutation(id);
        }
    }

    pub fn add_day(&self, id: TripId) -> Option<DayId> {
        let day_id = self.with_trips(|set| set.add_day(id));
        if day_id.is_some() {
            self.after_mutation(id);
        }
        day_id
    }

    pub fn update_day(&self, id: TripId, day_id: DayId, patch: DayPatch) {
        if self.with_trips(|set| set.update_day(id, day_id, patch)) {
            self.after_mutation(id);
        }
    }

    pub fn remove_day(&self, id: TripId, day_id: DayId) {
        if self.with_trips(|set| set.remove_day(id, day_id)) {
            self.after_mutation(id);
        }
    }

    pub fn add_item(&self, id: TripId, day_id: DayId, category: ItemCategory) -> Option<ItemId> {
        let item_id = self.with_trips(|set| set.add_item(id, day_id, category));
        if item_id.is_some() {
            self.after_mutation(id);
        }
        item_id
    }

    pub fn update_item(&self, id: TripId, day_id: DayId, item_id: ItemId, patch: ItemPatch) {
        if self.with_trips(|set| set.update_item(id, day_id, item_id, patch)) {
            self.after_mutation(id);
        }
    }

    pub fn remove_item(&self, id: TripId, day_id: DayId, item_id: ItemId) {
        if self.with_trips(|set| set.remove_item(id, day_id, item_id)) {
            self.after_mutation(id);
        }
    }

    pub fn add_packing(&self, id: TripId, category: PackingCategory) -> Option<PackId> {
        let pack_id = self.with_trips(|set| set.add_packing(id, category));
        if pack_id.is_some() {
            self.after_mutation(id);
        }
        pack_id
    }

    pub fn update_packing(&self, id: TripId, pack_id: PackId, patch: PackingPatch) {
        if self.with_trips(|set| set.update_packing(id, pack_id, patch)) {
            self.after_mutation(id);
        }
    }

    pub fn remove_packing(&self, id: TripId, pack_id: PackId) {
        if self.with_trips(|set| set.remove_packing(id, pack_id)) {
            self.after_mutation(id);
        }
    }

    fn after_mutation(&self, id: TripId) {
        self.persist_in_background();
        let linked = self.with_trips(|set| set.get(id).is_some_and(|trip| trip.share_linked));
        if linked {
            self.schedule_push(id);
        }
    }

    /// Delete a trip. A share-linked trip's shared record is removed
    /// before the local copy so other clients cannot resurrect it by
    /// polling; a failed shared delete is logged, never surfaced, and
    /// the local delete still proceeds.
    pub async fn delete_trip(&self, id: TripId) {
        self.cancel_pending(id);
        let linked = self.with_trips(|set| set.get(id).is_some_and(|trip| trip.share_linked));
        if linked {
            if let Err(error) = self.store.delete(Namespace::Shared, &trip_key(id)).await {
                warn!(trip = %id, %error, "failed to remove shared record");
            }
        }
        self.with_trips(|set| set.remove_trip(id));
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        self.persist_in_background();
    }

    // ===== Push =====

    /// Publish a trip and return its join code. Rolls the share-linked
    /// flag back if the first push fails.
    pub async fn share(&self, id: TripId) -> Result<String> {
        if !self.with_trips(|set| set.set_share_linked(id, true)) {
            return Err(Error::NotFound(id.as_str()));
        }
        match self.push(id).await {
            Ok(trip) => Ok(trip.join_code()),
            Err(error) => {
                self.with_trips(|set| set.set_share_linked(id, false));
                Err(error)
            }
        }
    }

    /// Remove the shared record and stop syncing the trip
    pub async fn unshare(&self, id: TripId) -> Result<()> {
        if self.with_trips(|set| set.get(id).is_none()) {
            return Err(Error::NotFound(id.as_str()));
        }
        self.cancel_pending(id);
        self.store.delete(Namespace::Shared, &trip_key(id)).await?;
        self.with_trips(|set| set.set_share_linked(id, false));
        self.set_status(id, SyncStatus::Idle);
        self.persist_in_background();
        Ok(())
    }

    /// User-requested immediate push, superseding any pending timer.
    /// Only share-linked trips may be written to the shared namespace.
    pub async fn force_sync(&self, id: TripId) -> Result<()> {
        match self.with_trips(|set| set.get(id).map(|trip| trip.share_linked)) {
            None => return Err(Error::NotFound(id.as_str())),
            Some(false) => return Err(Error::NotShared(id.as_str())),
            Some(true) => {}
        }
        self.cancel_pending(id);
        self.push(id).await?;
        Ok(())
    }

    /// Write the full current local value, revision refreshed to now,
    /// into the shared namespace. Local state is authoritative on push:
    /// failure flips the status but rolls nothing back.
    async fn push(&self, id: TripId) -> Result<Trip> {
        let Some(trip) = self.with_trips(|set| set.touch(id)) else {
            return Err(Error::NotFound(id.as_str()));
        };
        self.set_status(id, SyncStatus::Syncing);
        match self.write_shared(&trip).await {
            Ok(()) => {
                debug!(trip = %id, revision = trip.revision, "pushed");
                self.set_status(id, SyncStatus::Ok);
                self.persist_in_background();
                Ok(trip)
            }
            Err(error) => {
                self.set_status(id, SyncStatus::Error);
                Err(error)
            }
        }
    }

    async fn write_shared(&self, trip: &Trip) -> Result<()> {
        let payload = serde_json::to_string(trip)?;
        self.store
            .set(Namespace::Shared, &trip_key(trip.id), &payload)
            .await
    }

    /// Debounced auto-push: a new request supersedes the pending timer
    /// so edit bursts coalesce into a single push. The trip's existence
    /// and share-linked flag are re-checked when the timer fires, not
    /// when it is scheduled.
    fn schedule_push(&self, id: TripId) {
        let engine = self.clone();
        let delay = self.config.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let linked =
                engine.with_trips(|set| set.get(id).is_some_and(|trip| trip.share_linked));
            if linked {
                if let Err(error) = engine.push(id).await {
                    warn!(trip = %id, %error, "debounced push failed");
                }
            }
            engine.lock_pending().remove(&id);
        });

        let mut pending = self.lock_pending();
        if let Some(previous) = pending.insert(id, handle) {
            previous.abort();
        }
    }

    fn cancel_pending(&self, id: TripId) {
        if let Some(handle) = self.lock_pending().remove(&id) {
            handle.abort();
        }
    }

    // ===== Pull =====

    /// Fetch one trip's shared copy and merge by LWW. Absent records are
    /// a no-op (the owner may not have pushed yet, or the trip was
    /// unshared). Returns whether the local copy was replaced.
    ///
    /// The share-linked flag is re-checked here, not at scheduling time,
    /// so a pull in flight across a delete or unshare degrades to a no-op.
    pub async fn pull(&self, id: TripId) -> Result<bool> {
        let linked = self.with_trips(|set| set.get(id).is_some_and(|trip| trip.share_linked));
        if !linked {
            return Ok(false);
        }
        let Some(raw) = self.store.get(Namespace::Shared, &trip_key(id)).await? else {
            return Ok(false);
        };
        let remote: Trip = serde_json::from_str(&raw)?;
        let replaced = self.with_trips(|set| set.apply_remote(remote));
        if replaced {
            debug!(trip = %id, "replaced by newer shared copy");
            self.persist_in_background();
        }
        Ok(replaced)
    }

    /// Pull every share-linked trip; one trip's failure never aborts
    /// the rest of the round.
    pub async fn pull_all(&self) {
        let ids = self.with_trips(|trips| trips.share_linked_ids());
        for id in ids {
            if let Err(error) = self.pull(id).await {
                self.set_status(id, SyncStatus::Error);
                warn!(trip = %id, %error, "pull failed");
            }
        }
    }

    /// Start the polling loop. The first round runs immediately, then
    /// repeats on the configured interval until the handle is aborted.
    #[must_use]
    pub fn spawn_poller(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.poll_interval);
            loop {
                ticker.tick().await;
                engine.pull_all().await;
            }
        })
    }

    // ===== Join =====

    /// Resolve a short human-typed code against the shared namespace and
    /// import the matching trip as a new share-linked local trip.
    pub async fn join(&self, code: &str) -> Result<Trip> {
        let code = normalize_code(code)?;

        // Already tracked locally: reject before any storage call
        if self
            .with_trips(|set| set.find_by_id_prefix(&code).is_some())
        {
            return Err(Error::AlreadyJoined);
        }

        let keys = self
            .store
            .list_keys(Namespace::Shared, TRIP_KEY_PREFIX)
            .await?;
        let key = join::match_shared_key(&keys, &code)?.to_string();

        let raw = self
            .store
            .get(Namespace::Shared, &key)
            .await?
            .ok_or_else(|| Error::TripUnreadable(code.clone()))?;
        let mut trip: Trip =
            serde_json::from_str(&raw).map_err(|_| Error::TripUnreadable(code.clone()))?;
        trip.share_linked = true;

        let id = trip.id;
        self.with_trips(|set| set.insert(trip.clone()));

        // The one failure that rolls an import back: the snapshot of the
        // imported trip cannot be written
        if let Err(error) = self.persist().await {
            self.with_trips(|set| set.remove_trip(id));
            return Err(error);
        }

        self.set_status(id, SyncStatus::Ok);
        Ok(trip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn fast_config() -> SyncConfig {
        SyncConfig {
            poll_interval: Duration::from_millis(20),
            debounce: Duration::from_millis(25),
        }
    }

    /// Engine whose debounce never fires within a test
    fn quiet_config() -> SyncConfig {
        SyncConfig {
            poll_interval: Duration::from_secs(600),
            debounce: Duration::from_secs(600),
        }
    }

    fn name_patch(name: &str) -> TripPatch {
        TripPatch {
            name: Some(name.to_string()),
            ..TripPatch::default()
        }
    }

    async fn shared_record<S: KvStore>(store: &S, id: TripId) -> Option<Trip> {
        let raw = store.get(Namespace::Shared, &trip_key(id)).await.unwrap()?;
        Some(serde_json::from_str(&raw).unwrap())
    }

    #[test]
    fn test_resolve_is_strictly_greater_lww() {
        let local = Trip::new("Local");
        let mut remote = local.clone();

        remote.revision = local.revision + 1;
        assert_eq!(resolve(&local, &remote), Winner::Remote);

        remote.revision = local.revision;
        assert_eq!(resolve(&local, &remote), Winner::Local);

        remote.revision = local.revision - 1;
        assert_eq!(resolve(&local, &remote), Winner::Local);
    }

    #[tokio::test]
    async fn test_share_publishes_record_and_returns_code() {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::with_config(Arc::clone(&store), quiet_config());

        let id = engine.create_trip("Lisbon");
        let created_revision = engine.get(id).unwrap().revision;
        let code = engine.share(id).await.unwrap();

        assert_eq!(code, id.short_code());
        assert_eq!(engine.status(id), SyncStatus::Ok);

        let record = shared_record(store.as_ref(), id).await.unwrap();
        assert!(record.share_linked);
        assert!(record.revision >= created_revision);
        assert_eq!(record.name, "Lisbon");
    }

    #[tokio::test]
    async fn test_push_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::with_config(Arc::clone(&store), quiet_config());

        let id = engine.create_trip("Lisbon");
        engine.share(id).await.unwrap();
        let first = shared_record(store.as_ref(), id).await.unwrap();
        assert_eq!(first, engine.get(id).unwrap());

        engine.force_sync(id).await.unwrap();
        let second = shared_record(store.as_ref(), id).await.unwrap();
        assert_eq!(second, engine.get(id).unwrap());
        assert!(second.revision >= first.revision);
    }

    #[tokio::test]
    async fn test_two_clients_converge() {
        let store = Arc::new(MemoryStore::new());
        let alice = SyncEngine::with_config(Arc::clone(&store), quiet_config());
        let bob = SyncEngine::with_config(Arc::clone(&store), quiet_config());

        let id = alice.create_trip("Lisbon");
        let code = alice.share(id).await.unwrap();

        let joined = bob.join(&code).await.unwrap();
        assert_eq!(joined.id, id);
        assert_eq!(joined.name, "Lisbon");
        assert!(joined.share_linked);
        assert_eq!(joined, alice.get(id).unwrap());

        // Bob edits and pushes; Alice polls and converges on his copy
        bob.update_trip(id, name_patch("Lisbon & Porto"));
        bob.force_sync(id).await.unwrap();
        alice.pull_all().await;
        assert_eq!(alice.get(id).unwrap(), bob.get(id).unwrap());

        // Alice edits back; Bob converges
        alice.update_trip(id, name_patch("Algarve"));
        alice.force_sync(id).await.unwrap();
        bob.pull_all().await;
        assert_eq!(bob.get(id).unwrap().name, "Algarve");
    }

    #[tokio::test]
    async fn test_stale_pull_leaves_local_untouched() {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::with_config(Arc::clone(&store), quiet_config());

        let id = engine.create_trip("Lisbon");
        engine.share(id).await.unwrap();

        // Local edit after the push: local revision now exceeds remote
        engine.update_trip(id, name_patch("Lisbon, revised"));
        let before = serde_json::to_string(&engine.get(id).unwrap()).unwrap();

        let replaced = engine.pull(id).await.unwrap();
        assert!(!replaced);
        let after = serde_json::to_string(&engine.get(id).unwrap()).unwrap();
        assert_eq!(before, after);

        // And the stale remote copy was not reflexively re-pushed
        let record = shared_record(store.as_ref(), id).await.unwrap();
        assert_eq!(record.name, "Lisbon");
    }

    #[tokio::test]
    async fn test_pull_of_absent_record_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::with_config(Arc::clone(&store), quiet_config());

        let id = engine.create_trip("Lisbon");
        engine.with_trips(|set| set.set_share_linked(id, true));

        let replaced = engine.pull(id).await.unwrap();
        assert!(!replaced);
        assert_eq!(engine.get(id).unwrap().name, "Lisbon");
    }

    #[tokio::test]
    async fn test_pull_skips_unlinked_trip() {
        let engine = SyncEngine::with_config(Arc::new(MemoryStore::new()), quiet_config());

        let id = engine.create_trip("Lisbon");
        let replaced = engine.pull(id).await.unwrap();
        assert!(!replaced);
    }

    #[tokio::test]
    async fn test_force_sync_rejects_unshared_trip() {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::with_config(Arc::clone(&store), quiet_config());

        let id = engine.create_trip("Lisbon");
        let error = engine.force_sync(id).await.unwrap_err();
        assert!(matches!(error, Error::NotShared(_)));
        assert!(shared_record(store.as_ref(), id).await.is_none());

        let missing = TripId::new();
        let error = engine.force_sync(missing).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_pull_failure_is_isolated_per_trip() {
        let store = Arc::new(MemoryStore::new());
        let alice = SyncEngine::with_config(Arc::clone(&store), quiet_config());
        let bob = SyncEngine::with_config(Arc::clone(&store), quiet_config());

        let broken = alice.create_trip("Broken");
        let healthy = alice.create_trip("Healthy");
        let broken_code = alice.share(broken).await.unwrap();
        let healthy_code = alice.share(healthy).await.unwrap();
        bob.join(&broken_code).await.unwrap();
        bob.join(&healthy_code).await.unwrap();

        alice.update_trip(healthy, name_patch("Healthy v2"));
        alice.force_sync(healthy).await.unwrap();

        // Corrupt one shared record; the other must still pull
        store
            .set(Namespace::Shared, &trip_key(broken), "not json")
            .await
            .unwrap();

        bob.pull_all().await;
        assert_eq!(bob.get(healthy).unwrap().name, "Healthy v2");
        assert_eq!(bob.status(broken), SyncStatus::Error);
        assert_eq!(bob.get(broken).unwrap().name, "Broken");
    }

    #[tokio::test]
    async fn test_push_failure_sets_error_status_and_rolls_back_share() {
        struct OfflineStore;

        impl KvStore for OfflineStore {
            async fn get(&self, _: Namespace, _: &str) -> Result<Option<String>> {
                Err(Error::Storage("offline".to_string()))
            }
            async fn set(&self, _: Namespace, _: &str, _: &str) -> Result<()> {
                Err(Error::Storage("offline".to_string()))
            }
            async fn delete(&self, _: Namespace, _: &str) -> Result<()> {
                Err(Error::Storage("offline".to_string()))
            }
            async fn list_keys(&self, _: Namespace, _: &str) -> Result<Vec<String>> {
                Err(Error::Storage("offline".to_string()))
            }
        }

        let engine = SyncEngine::with_config(Arc::new(OfflineStore), quiet_config());
        let id = engine.create_trip("Lisbon");

        let error = engine.share(id).await.unwrap_err();
        assert!(matches!(error, Error::Storage(_)));
        assert_eq!(engine.status(id), SyncStatus::Error);
        // Share rolled back: the trip stays private
        assert!(!engine.get(id).unwrap().share_linked);
    }

    #[tokio::test]
    async fn test_debounced_pushes_coalesce() {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::with_config(Arc::clone(&store), fast_config());

        let id = engine.create_trip("Lisbon");
        engine.share(id).await.unwrap();

        // A burst of edits within the quiescence window
        engine.update_trip(id, name_patch("draft one"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.update_trip(id, name_patch("final name"));

        tokio::time::sleep(Duration::from_millis(120)).await;
        let record = shared_record(store.as_ref(), id).await.unwrap();
        assert_eq!(record.name, "final name");
    }

    #[tokio::test]
    async fn test_pending_push_becomes_noop_after_unshare() {
        let store = Arc::new(MemoryStore::new());
        let engine = SyncEngine::with_config(Arc::clone(&store), fast_config());

        let id = engine.create_trip("Lisbon");
        engine.share(id).await.unwrap();
        engine.update_trip(id, name_patch("never published"));
        engine.unshare(id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(shared_record(store.as_ref(), id).await.is_none());
        assert!(!engine.get(id).unwrap().share_linked);
    }

    #[tokio::test]
    async fn test_join_rejects_already_tracked_trip() {
        let store = Arc::new(MemoryStore::new());
        let alice = SyncEngine::with_config(Arc::clone(&store), quiet_config());
        let bob = SyncEngine::with_config(Arc::clone(&store), quiet_config());

        let id = alice.create_trip("Lisbon");
        let code = alice.share(id).await.unwrap();

        // Owner cannot re-import their own trip
        let error = alice.join(&code).await.unwrap_err();
        assert!(matches!(error, Error::AlreadyJoined));

        // A second join on the same client is rejected too
        bob.join(&code).await.unwrap();
        let error = bob.join(&code).await.unwrap_err();
        assert!(matches!(error, Error::AlreadyJoined));
        assert_eq!(bob.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_join_rejects_malformed_codes() {
        let engine = SyncEngine::with_config(Arc::new(MemoryStore::new()), quiet_config());

        let error = engine.join("ab-12").await.unwrap_err();
        assert!(matches!(error, Error::InvalidCode { .. }));

        let error = engine.join("fffffff").await.unwrap_err();
        assert!(matches!(error, Error::CodeNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_shared_record_and_blocks_rejoin() {
        let store = Arc::new(MemoryStore::new());
        let alice = SyncEngine::with_config(Arc::clone(&store), quiet_config());
        let bob = SyncEngine::with_config(Arc::clone(&store), quiet_config());

        let id = alice.create_trip("Lisbon");
        let code = alice.share(id).await.unwrap();

        alice.delete_trip(id).await;
        assert!(alice.get(id).is_none());
        assert!(shared_record(store.as_ref(), id).await.is_none());

        let error = bob.join(&code).await.unwrap_err();
        assert!(matches!(error, Error::CodeNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_clears_shared_record_before_local_copy() {
        use std::sync::OnceLock;

        struct WitnessStore {
            inner: MemoryStore,
            engine: OnceLock<SyncEngine<WitnessStore>>,
            local_present_at_delete: Mutex<Option<bool>>,
        }

        impl KvStore for WitnessStore {
            async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<String>> {
                self.inner.get(namespace, key).await
            }
            async fn set(&self, namespace: Namespace, key: &str, value: &str) -> Result<()> {
                self.inner.set(namespace, key, value).await
            }
            async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
                if namespace == Namespace::Shared {
                    if let Some(engine) = self.engine.get() {
                        let id: TripId =
                            key.strip_prefix(TRIP_KEY_PREFIX).unwrap().parse().unwrap();
                        *self.local_present_at_delete.lock().unwrap() =
                            Some(engine.get(id).is_some());
                    }
                }
                self.inner.delete(namespace, key).await
            }
            async fn list_keys(&self, namespace: Namespace, prefix: &str) -> Result<Vec<String>> {
                self.inner.list_keys(namespace, prefix).await
            }
        }

        let store = Arc::new(WitnessStore {
            inner: MemoryStore::new(),
            engine: OnceLock::new(),
            local_present_at_delete: Mutex::new(None),
        });
        let engine = SyncEngine::with_config(Arc::clone(&store), quiet_config());
        store.engine.set(engine.clone()).ok();

        let id = engine.create_trip("Lisbon");
        engine.share(id).await.unwrap();
        engine.delete_trip(id).await;

        // The shared record went away while the local copy still existed
        assert_eq!(*store.local_present_at_delete.lock().unwrap(), Some(true));
        assert!(engine.get(id).is_none());
        assert!(shared_record(store.as_ref(), id).await.is_none());
    }

    #[tokio::test]
    async fn test_poller_picks_up_remote_edits() {
        let store = Arc::new(MemoryStore::new());
        let alice = SyncEngine::with_config(Arc::clone(&store), quiet_config());
        let bob = SyncEngine::with_config(Arc::clone(&store), fast_config());

        let id = alice.create_trip("Lisbon");
        let code = alice.share(id).await.unwrap();
        bob.join(&code).await.unwrap();

        let poller = bob.spawn_poller();
        alice.update_trip(id, name_patch("From Alice"));
        alice.force_sync(id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.abort();

        assert_eq!(bob.get(id).unwrap().name, "From Alice");
    }

    #[tokio::test]
    async fn test_load_restores_persisted_snapshot() {
        let store = Arc::new(MemoryStore::new());

        {
            let engine = SyncEngine::with_config(Arc::clone(&store), quiet_config());
            let id = engine.create_trip("Lisbon");
            engine.update_trip(id, name_patch("Saved"));
            engine.persist().await.unwrap();
        }

        let engine = SyncEngine::with_config(Arc::clone(&store), quiet_config());
        assert_eq!(engine.load().await.unwrap(), 1);
        assert_eq!(engine.snapshot()[0].name, "Saved");
    }

    /// The end-to-end scenario: create, share, edit, debounce, join
    #[tokio::test]
    async fn test_share_edit_debounce_join_scenario() {
        let store = Arc::new(MemoryStore::new());
        let alice = SyncEngine::with_config(Arc::clone(&store), fast_config());
        let bob = SyncEngine::with_config(Arc::clone(&store), fast_config());

        let id = alice.create_trip("Lisbon");
        let code = alice.share(id).await.unwrap();
        let shared_revision = shared_record(store.as_ref(), id).await.unwrap().revision;

        // One edit, then the quiescence window elapses
        let day_id = alice.add_day(id).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        let record = shared_record(store.as_ref(), id).await.unwrap();
        assert!(record.revision > shared_revision);
        assert_eq!(record.days.len(), 1);
        assert_eq!(record.days[0].id, day_id);

        let joined = bob.join(&code).await.unwrap();
        assert_eq!(joined.days.len(), 1);
        assert!(joined.share_linked);
    }
}
