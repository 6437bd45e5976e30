use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] voyageur_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No trip name provided")]
    EmptyName,
    #[error("Trip not found for id/code: {0}")]
    TripNotFound(String),
    #[error("{0}")]
    AmbiguousTripId(String),
    #[error("No day #{0} in this trip")]
    DayNotFound(usize),
    #[error("No item #{0} in this day")]
    ItemNotFound(usize),
    #[error("No packing entry #{0} in this trip")]
    PackNotFound(usize),
}
