use domain::Record;
use thiserror::Error;

use crate::RecordId;

/// Errors that can occur when interacting with the record and order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write collided with the identity or mbid of an existing record.
    #[error(
        "Record already exists: {} - {} ({}) with id {}",
        .0.artist, .0.album, .0.format, .0.id
    )]
    Duplicate(Box<Record>),

    /// A decrement would take a record's stock below zero.
    #[error("Stock underflow for record {id}: available {available}, requested {requested}")]
    StockUnderflow {
        id: RecordId,
        available: u32,
        requested: u32,
    },

    /// The row targeted by a write does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A scope was used after it was committed or aborted.
    #[error("Transaction scope already finished")]
    ScopeFinished,

    /// A stored row could not be mapped back into the domain model.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
