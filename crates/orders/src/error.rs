//! Order error types.

use store::StoreError;
use thiserror::Error;

/// Errors that can occur when creating or reading orders.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request itself is malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The record or order does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The record does not hold enough stock for the order.
    #[error("Insufficient stock. Available: {available}, Requested: {requested}")]
    InsufficientStock { available: u32, requested: u32 },

    /// Storage failed; the scope was aborted before this was raised.
    #[error("Internal error: {0}")]
    Internal(#[from] StoreError),
}

/// Convenience type alias for order results.
pub type Result<T> = std::result::Result<T, OrderError>;
