//! Catalog error types.

use domain::{DomainError, Record};
use retry::UpstreamError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur in catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The write collides with an existing record, which is carried along.
    #[error(
        "Record already exists: {} - {} ({})",
        .0.artist, .0.album, .0.format
    )]
    Conflict(Box<Record>),

    /// The metadata provider could not be used.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Storage failed.
    #[error("Internal error: {0}")]
    Internal(#[source] StoreError),
}

impl From<DomainError> for CatalogError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, reason } => {
                CatalogError::Validation(format!("{field} {reason}"))
            }
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(existing) => CatalogError::Conflict(existing),
            StoreError::NotFound(what) => CatalogError::NotFound(what),
            other => CatalogError::Internal(other),
        }
    }
}

/// Convenience type alias for catalog results.
pub type Result<T> = std::result::Result<T, CatalogError>;
