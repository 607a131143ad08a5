use async_trait::async_trait;
use domain::{NewRecord, Order, Page, Pagination, Record, RecordFilter, RecordUpdate};

use crate::{OrderId, RecordId, Result, TransactionContext};

/// Persistence operations for catalog records.
///
/// Implementations enforce the uniqueness rules of the catalog: the
/// `(artist, album, format)` triple is unique, and `mbid` is unique among
/// records that have one. Violations surface as [`crate::StoreError::Duplicate`]
/// carrying the record already holding the identity.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Retrieves a record by id.
    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>>;

    /// Retrieves the first record matching a filter.
    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<Record>>;

    /// Retrieves one page of records matching a filter.
    ///
    /// When `filter.search` is set, results are ordered by text relevance;
    /// otherwise newest first.
    async fn paginated_find(
        &self,
        filter: &RecordFilter,
        pagination: Pagination,
    ) -> Result<Page<Record>>;

    /// Inserts a new record.
    async fn create(&self, record: NewRecord) -> Result<Record>;

    /// Applies a partial update. Returns `None` if the record does not exist.
    async fn update(&self, id: RecordId, update: RecordUpdate) -> Result<Option<Record>>;

    /// Deletes a record. Returns false if it did not exist.
    async fn delete(&self, id: RecordId) -> Result<bool>;

    /// Decrements the stock of a record outside any transactional scope.
    async fn decrement_qty(&self, id: RecordId, delta: u32) -> Result<()>;
}

/// Persistence operations for orders.
///
/// Creating an order as part of a stock decrement goes through
/// [`crate::TransactionScope::insert_order`] instead.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts an order outside any transactional scope.
    async fn create(&self, order: &Order) -> Result<()>;

    /// Retrieves an order by id.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Retrieves every order, newest first.
    async fn find_all(&self) -> Result<Vec<Order>>;
}

/// Everything the services need from a storage backend.
pub trait Storage:
    RecordRepository + OrderRepository + TransactionContext + Clone + Send + Sync + 'static
{
}

impl<T> Storage for T where
    T: RecordRepository + OrderRepository + TransactionContext + Clone + Send + Sync + 'static
{
}
