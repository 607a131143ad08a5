pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod transaction;

pub use common::{OrderId, RecordId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, MemoryScope};
pub use postgres::{PgScope, PgStore};
pub use repository::{OrderRepository, RecordRepository, Storage};
pub use transaction::{TransactionContext, TransactionMode, TransactionScope};
