//! Domain layer for the record catalog backend.
//!
//! This crate provides the core domain types:
//! - [`Record`] catalog entries with their identity and stock level
//! - [`Order`] created by the order transaction coordinator
//! - [`Money`] value object for prices
//! - [`RecordFilter`], [`Pagination`] and [`Page`] for catalog queries

pub mod error;
pub mod money;
pub mod order;
pub mod query;
pub mod record;

pub use common::{OrderId, RecordId};
pub use error::{DomainError, Result};
pub use money::Money;
pub use order::{Order, OrderStatus};
pub use query::{Page, Pagination, RecordFilter};
pub use record::{NewRecord, Record, RecordFormat, RecordUpdate, Track};
