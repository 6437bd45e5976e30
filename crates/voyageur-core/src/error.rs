//! Error types for voyageur-core

use thiserror::Error;

/// Result type alias using voyageur-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in voyageur-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Key/value backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Trip not found locally
    #[error("Trip not found: {0}")]
    NotFound(String),

    /// Sync action against a trip that is not share-linked
    #[error("Trip is not shared: {0}")]
    NotShared(String),

    /// Join code rejected before any storage call
    #[error("Join code must be at least {min} alphanumeric characters")]
    InvalidCode { min: usize },

    /// No shared record matches the join code
    #[error("Code not found: {0}")]
    CodeNotFound(String),

    /// More than one shared record matches the join code
    #[error("Code '{0}' matches more than one shared trip")]
    AmbiguousCode(String),

    /// A shared record matched the code but could not be read
    #[error("Trip not found for code: {0}")]
    TripUnreadable(String),

    /// The trip behind the join code is already tracked locally
    #[error("This trip is already in your list")]
    AlreadyJoined,
}
