//! Shared identifier types used across the catalog and order crates.

pub mod types;

pub use types::{IdParseError, OrderId, RecordId};
