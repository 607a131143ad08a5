//! Order creation as a single atomic unit against catalog stock.
//!
//! [`OrderTransactionCoordinator`] reads a record under lock, checks its
//! stock, inserts the order and decrements the stock inside one
//! [`store::TransactionScope`]. Any failure aborts the scope, so a rejected
//! order leaves neither an order row nor a stock change behind.

pub mod coordinator;
pub mod error;

pub use coordinator::{OrderResult, OrderTransactionCoordinator};
pub use error::{OrderError, Result};
