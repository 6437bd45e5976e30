//! Packing list model

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A unique identifier for a packing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackId(Uuid);

impl PackId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Packing category (closed enumeration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackingCategory {
    Clothing,
    Documents,
    Hygiene,
    Electronics,
    Health,
    Misc,
}

impl PackingCategory {
    /// Human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Clothing => "Clothing",
            Self::Documents => "Documents",
            Self::Hygiene => "Hygiene",
            Self::Electronics => "Electronics",
            Self::Health => "Health",
            Self::Misc => "Misc",
        }
    }
}

/// A single entry in a trip's packing list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingEntry {
    pub id: PackId,
    pub label: String,
    pub category: PackingCategory,
    pub packed: bool,
    /// Always at least 1
    pub quantity: u32,
}

impl PackingEntry {
    /// Create an empty unpacked entry in the given category
    #[must_use]
    pub fn new(category: PackingCategory) -> Self {
        Self {
            id: PackId::new(),
            label: String::new(),
            category,
            packed: false,
            quantity: 1,
        }
    }
}
