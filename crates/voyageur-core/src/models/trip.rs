//! Trip document model: the top-level shareable unit of state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Length of the short human-typed join code derived from a trip id.
pub const JOIN_CODE_LEN: usize = 7;

/// A unique identifier for a trip.
///
/// Uses UUID v4 (fully random): join codes are id prefixes, so ids must be
/// drawn from a large random space rather than a time-sortable one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripId(Uuid);

impl TripId {
    /// Create a new unique trip ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }

    /// The short join code for this trip: the first alphanumeric
    /// characters of the id, rendered uppercase for display.
    #[must_use]
    pub fn short_code(&self) -> String {
        self.0
            .to_string()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(JOIN_CODE_LEN)
            .collect::<String>()
            .to_uppercase()
    }
}

impl Default for TripId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TripId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A unique identifier for a day within a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayId(Uuid);

impl DayId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DayId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for an itinerary item within a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of an itinerary item (closed enumeration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Lodging,
    Dining,
    Activity,
    Transport,
    Note,
}

impl ItemCategory {
    /// Human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Lodging => "Lodging",
            Self::Dining => "Dining",
            Self::Activity => "Activity",
            Self::Transport => "Transport",
            Self::Note => "Note",
        }
    }
}

/// A single itinerary entry within a day.
///
/// Only `id`, `category`, and `done` carry meaning for the core; the
/// remaining fields are payload carried through sync untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub category: ItemCategory,
    pub title: String,
    pub time: String,
    pub location: String,
    pub cost: String,
    pub notes: String,
    pub done: bool,
    pub rating: u8,
    pub link: String,
}

impl Item {
    /// Create an empty item in the given category
    #[must_use]
    pub fn new(category: ItemCategory) -> Self {
        Self {
            id: ItemId::new(),
            category,
            title: String::new(),
            time: String::new(),
            location: String::new(),
            cost: String::new(),
            notes: String::new(),
            done: false,
            rating: 0,
            link: String::new(),
        }
    }
}

/// One planned day of a trip, holding items in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub id: DayId,
    pub date: String,
    pub title: String,
    pub notes: String,
    pub items: Vec<Item>,
}

impl Day {
    /// Create an empty day
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: DayId::new(),
            date: String::new(),
            title: String::new(),
            notes: String::new(),
            items: Vec::new(),
        }
    }
}

impl Default for Day {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate counters over a trip's items and packing list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripStats {
    pub item_count: usize,
    pub done_count: usize,
    pub total_cost: f64,
    pub packed_count: usize,
    pub packing_count: usize,
}

/// A trip: the document that sync pushes, pulls, and merges whole.
///
/// `revision` is the sole arbiter of "newer" during merge; everything
/// except `id`, `revision`, `share_linked`, and the nested collections
/// is opaque payload the engine round-trips without interpreting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// Unique identifier, immutable after creation
    pub id: TripId,
    /// Monotonic revision stamp (Unix ms), refreshed on every mutation
    pub revision: i64,
    /// True once the trip has been published to the shared namespace
    pub share_linked: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    pub name: String,
    pub destination: String,
    pub country: String,
    pub start_date: String,
    pub end_date: String,
    pub budget: String,
    pub currency: String,
    pub cover_emoji: String,
    pub participants: Vec<String>,
    pub notes: String,
    /// Days in insertion order (chronological intent, not enforced)
    pub days: Vec<Day>,
    pub packing: Vec<super::PackingEntry>,
}

impl Trip {
    /// Create a new private trip with the given name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: TripId::new(),
            revision: now,
            share_linked: false,
            created_at: now,
            name: name.into(),
            destination: String::new(),
            country: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            budget: String::new(),
            currency: "EUR".to_string(),
            cover_emoji: "✈".to_string(),
            participants: Vec::new(),
            notes: String::new(),
            days: Vec::new(),
            packing: Vec::new(),
        }
    }

    /// The short join code shared with other clients
    #[must_use]
    pub fn join_code(&self) -> String {
        self.id.short_code()
    }

    /// Aggregate counters used by list/detail views
    #[must_use]
    pub fn stats(&self) -> TripStats {
        let items = self.days.iter().flat_map(|day| day.items.iter());
        let mut item_count = 0;
        let mut done_count = 0;
        let mut total_cost = 0.0;
        for item in items {
            item_count += 1;
            if item.done {
                done_count += 1;
            }
            total_cost += item.cost.trim().parse::<f64>().unwrap_or(0.0);
        }
        TripStats {
            item_count,
            done_count,
            total_cost,
            packed_count: self.packing.iter().filter(|entry| entry.packed).count(),
            packing_count: self.packing.len(),
        }
    }
}
