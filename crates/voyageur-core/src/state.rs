//! Local mutation layer: the owned in-memory collection of trips.
//!
//! `TripSet` is the only writer of in-memory state. Every structural
//! mutation re-stamps the parent trip's revision; operations against
//! missing ids are silent no-ops so late UI events against deleted
//! entities are tolerated. Persistence and remote propagation are the
//! sync engine's concern, not this layer's.

use crate::models::{
    Day, DayId, Item, ItemCategory, ItemId, PackId, PackingCategory, PackingEntry, Trip, TripId,
};
use crate::sync::{resolve, Winner};

/// Partial update for a trip's descriptive fields. `None` fields are
/// left untouched.
#[derive(Debug, Clone, Default)]
pub struct TripPatch {
    pub name: Option<String>,
    pub destination: Option<String>,
    pub country: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub budget: Option<String>,
    pub currency: Option<String>,
    pub cover_emoji: Option<String>,
    pub participants: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// Partial update for a day
#[derive(Debug, Clone, Default)]
pub struct DayPatch {
    pub date: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
}

/// Partial update for an itinerary item
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub category: Option<ItemCategory>,
    pub title: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub cost: Option<String>,
    pub notes: Option<String>,
    pub done: Option<bool>,
    pub rating: Option<u8>,
    pub link: Option<String>,
}

/// Partial update for a packing entry. Quantity is clamped to at least 1.
#[derive(Debug, Clone, Default)]
pub struct PackingPatch {
    pub label: Option<String>,
    pub category: Option<PackingCategory>,
    pub packed: Option<bool>,
    pub quantity: Option<u32>,
}

fn apply_field<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// The canonical local collection of trips, in insertion order
#[derive(Debug, Default)]
pub struct TripSet {
    trips: Vec<Trip>,
}

impl TripSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a trip's revision: strictly greater than before, and at
    /// least the current wall clock.
    fn stamp(trip: &mut Trip) {
        let now = chrono::Utc::now().timestamp_millis();
        trip.revision = now.max(trip.revision + 1);
    }

    fn find_mut(&mut self, id: TripId) -> Option<&mut Trip> {
        self.trips.iter_mut().find(|trip| trip.id == id)
    }

    /// Run `edit` against the trip, stamping its revision only when the
    /// edit reports that it applied. Returns false (a no-op, not an
    /// error) when the trip is missing or the edit found nothing to
    /// change; a no-op leaves the revision untouched so nothing gets
    /// pushed for an unchanged document.
    fn mutate(&mut self, id: TripId, edit: impl FnOnce(&mut Trip) -> bool) -> bool {
        match self.find_mut(id) {
            Some(trip) => {
                if edit(trip) {
                    Self::stamp(trip);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    // ===== Reads =====

    #[must_use]
    pub fn get(&self, id: TripId) -> Option<&Trip> {
        self.trips.iter().find(|trip| trip.id == id)
    }

    /// Clone of the whole collection, insertion order preserved
    #[must_use]
    pub fn snapshot(&self) -> Vec<Trip> {
        self.trips.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trips.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Ids of all share-linked trips
    #[must_use]
    pub fn share_linked_ids(&self) -> Vec<TripId> {
        self.trips
            .iter()
            .filter(|trip| trip.share_linked)
            .map(|trip| trip.id)
            .collect()
    }

    /// Find a trip whose id starts with the given lowercase prefix
    #[must_use]
    pub fn find_by_id_prefix(&self, prefix: &str) -> Option<&Trip> {
        self.trips
            .iter()
            .find(|trip| trip.id.as_str().starts_with(prefix))
    }

    // ===== Trip-level mutations =====

    /// Create a new private trip and return its id
    pub fn create_trip(&mut self, name: impl Into<String>) -> TripId {
        let trip = Trip::new(name);
        let id = trip.id;
        self.trips.push(trip);
        id
    }

    /// Insert a trip as-is (join imports an already-stamped document)
    pub fn insert(&mut self, trip: Trip) {
        self.trips.push(trip);
    }

    /// Remove a trip, returning it so the caller can clean up its
    /// shared record
    pub fn remove_trip(&mut self, id: TripId) -> Option<Trip> {
        let index = self.trips.iter().position(|trip| trip.id == id)?;
        Some(self.trips.remove(index))
    }

    pub fn update_trip(&mut self, id: TripId, patch: TripPatch) -> bool {
        self.mutate(id, |trip| {
            apply_field(&mut trip.name, patch.name);
            apply_field(&mut trip.destination, patch.destination);
            apply_field(&mut trip.country, patch.country);
            apply_field(&mut trip.start_date, patch.start_date);
            apply_field(&mut trip.end_date, patch.end_date);
            apply_field(&mut trip.budget, patch.budget);
            apply_field(&mut trip.currency, patch.currency);
            apply_field(&mut trip.cover_emoji, patch.cover_emoji);
            apply_field(&mut trip.participants, patch.participants);
            apply_field(&mut trip.notes, patch.notes);
            true
        })
    }

    /// Flip the share-linked flag without touching the revision, so a
    /// failed share can be rolled back without racing a concurrent pull
    pub fn set_share_linked(&mut self, id: TripId, linked: bool) -> bool {
        match self.find_mut(id) {
            Some(trip) => {
                trip.share_linked = linked;
                true
            }
            None => false,
        }
    }

    /// Refresh the revision and return a clone for pushing
    pub fn touch(&mut self, id: TripId) -> Option<Trip> {
        let trip = self.find_mut(id)?;
        Self::stamp(trip);
        Some(trip.clone())
    }

    /// Merge an inbound shared copy using last-writer-wins. On a remote
    /// win the whole local document is replaced and stays share-linked.
    /// Returns whether the local copy changed.
    pub fn apply_remote(&mut self, remote: Trip) -> bool {
        let Some(local) = self.find_mut(remote.id) else {
            return false;
        };
        match resolve(local, &remote) {
            Winner::Remote => {
                *local = Trip {
                    share_linked: true,
                    ..remote
                };
                true
            }
            Winner::Local => false,
        }
    }

    // ===== Day mutations =====

    /// Append an empty day, returning its id (None if the trip is gone)
    pub fn add_day(&mut self, id: TripId) -> Option<DayId> {
        let day = Day::new();
        let day_id = day.id;
        self.mutate(id, |trip| {
            trip.days.push(day);
            true
        })
        .then_some(day_id)
    }

    pub fn update_day(&mut self, id: TripId, day_id: DayId, patch: DayPatch) -> bool {
        self.mutate(id, |trip| {
            match trip.days.iter_mut().find(|day| day.id == day_id) {
                Some(day) => {
                    apply_field(&mut day.date, patch.date);
                    apply_field(&mut day.title, patch.title);
                    apply_field(&mut day.notes, patch.notes);
                    true
                }
                None => false,
            }
        })
    }

    /// Remove a day and, with it, all of its items
    pub fn remove_day(&mut self, id: TripId, day_id: DayId) -> bool {
        self.mutate(id, |trip| {
            let before = trip.days.len();
            trip.days.retain(|day| day.id != day_id);
            trip.days.len() < before
        })
    }

    // ===== Item mutations =====

    pub fn add_item(&mut self, id: TripId, day_id: DayId, category: ItemCategory) -> Option<ItemId> {
        let item = Item::new(category);
        let item_id = item.id;
        self.mutate(id, |trip| {
            match trip.days.iter_mut().find(|day| day.id == day_id) {
                Some(day) => {
                    day.items.push(item);
                    true
                }
                None => false,
            }
        })
        .then_some(item_id)
    }

    pub fn update_item(&mut self, id: TripId, day_id: DayId, item_id: ItemId, patch: ItemPatch) -> bool {
        self.mutate(id, |trip| {
            let item = trip
                .days
                .iter_mut()
                .find(|day| day.id == day_id)
                .and_then(|day| day.items.iter_mut().find(|item| item.id == item_id));
            match item {
                Some(item) => {
                    apply_field(&mut item.category, patch.category);
                    apply_field(&mut item.title, patch.title);
                    apply_field(&mut item.time, patch.time);
                    apply_field(&mut item.location, patch.location);
                    apply_field(&mut item.cost, patch.cost);
                    apply_field(&mut item.notes, patch.notes);
                    apply_field(&mut item.done, patch.done);
                    apply_field(&mut item.rating, patch.rating);
                    apply_field(&mut item.link, patch.link);
                    true
                }
                None => false,
            }
        })
    }

    pub fn remove_item(&mut self, id: TripId, day_id: DayId, item_id: ItemId) -> bool {
        self.mutate(id, |trip| {
            match trip.days.iter_mut().find(|day| day.id == day_id) {
                Some(day) => {
                    let before = day.items.len();
                    day.items.retain(|item| item.id != item_id);
                    day.items.len() < before
                }
                None => false,
            }
        })
    }

    // ===== Packing mutations =====

    pub fn add_packing(&mut self, id: TripId, category: PackingCategory) -> Option<PackId> {
        let entry = PackingEntry::new(category);
        let pack_id = entry.id;
        self.mutate(id, |trip| {
            trip.packing.push(entry);
            true
        })
        .then_some(pack_id)
    }

    pub fn update_packing(&mut self, id: TripId, pack_id: PackId, patch: PackingPatch) -> bool {
        self.mutate(id, |trip| {
            match trip.packing.iter_mut().find(|entry| entry.id == pack_id) {
                Some(entry) => {
                    apply_field(&mut entry.label, patch.label);
                    apply_field(&mut entry.category, patch.category);
                    apply_field(&mut entry.packed, patch.packed);
                    if let Some(quantity) = patch.quantity {
                        entry.quantity = quantity.max(1);
                    }
                    true
                }
                None => false,
            }
        })
    }

    pub fn remove_packing(&mut self, id: TripId, pack_id: PackId) -> bool {
        self.mutate(id, |trip| {
            let before = trip.packing.len();
            trip.packing.retain(|entry| entry.id != pack_id);
            trip.packing.len() < before
        })
    }

    /// Replace the whole collection (startup load from the snapshot)
    pub fn replace_all(&mut self, trips: Vec<Trip>) {
        self.trips = trips;
    }
}
