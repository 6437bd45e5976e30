//! Data models for Voyageur

mod packing;
mod trip;

pub use packing::{PackId, PackingCategory, PackingEntry};
pub use trip::{Day, DayId, Item, ItemCategory, ItemId, Trip, TripId, TripStats, JOIN_CODE_LEN};
