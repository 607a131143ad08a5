use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{NewRecord, Order, Page, Pagination, Record, RecordFilter, RecordUpdate};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    OrderId, RecordId, Result, StoreError,
    repository::{OrderRepository, RecordRepository},
    transaction::{TransactionContext, TransactionMode, TransactionScope},
};

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<RecordId, Record>,
    orders: Vec<Order>,
}

impl MemoryState {
    /// Returns the record, other than `skip`, that already holds the identity
    /// triple or the mbid of `candidate`.
    fn find_conflict(&self, candidate: &Record, skip: Option<RecordId>) -> Option<&Record> {
        self.records.values().find(|existing| {
            if Some(existing.id) == skip {
                return false;
            }
            let same_identity =
                existing.has_identity(&candidate.artist, &candidate.album, candidate.format);
            let same_mbid = matches!(
                (&existing.mbid, &candidate.mbid),
                (Some(a), Some(b)) if a == b
            );
            same_identity || same_mbid
        })
    }

    fn decrement(&mut self, id: RecordId, delta: u32) -> Result<()> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("record {id}")))?;
        record.qty = record
            .qty
            .checked_sub(delta)
            .ok_or(StoreError::StockUnderflow {
                id,
                available: record.qty,
                requested: delta,
            })?;
        record.updated_at = chrono::Utc::now();
        Ok(())
    }
}

/// In-memory store implementation for testing and single-process use.
///
/// A transactional scope owns the store's write lock for its whole lifetime,
/// which serializes every read-check-write sequence against the store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    mode: TransactionMode,
}

impl InMemoryStore {
    /// Creates a new empty store with transactional scopes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose scopes run without locking or rollback.
    pub fn sequential() -> Self {
        tracing::warn!(
            "in-memory store running in sequential mode; order creation is unsafe under concurrency"
        );
        Self {
            state: Arc::default(),
            mode: TransactionMode::Sequential,
        }
    }

    /// Returns the total number of records stored.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

fn matches_filter(record: &Record, filter: &RecordFilter) -> bool {
    if let Some(ref artist) = filter.artist
        && &record.artist != artist
    {
        return false;
    }
    if let Some(ref album) = filter.album
        && &record.album != album
    {
        return false;
    }
    if let Some(format) = filter.format
        && record.format != format
    {
        return false;
    }
    if let Some(ref category) = filter.category
        && &record.category != category
    {
        return false;
    }
    if let Some(ref mbid) = filter.mbid
        && record.mbid.as_ref() != Some(mbid)
    {
        return false;
    }
    true
}

/// Counts term occurrences across the searchable fields. `None` when a term
/// is missing, since every term has to match.
fn search_rank(record: &Record, terms: &[String]) -> Option<usize> {
    let haystack = format!("{} {} {}", record.artist, record.album, record.category).to_lowercase();
    let mut rank = 0;
    for term in terms {
        let hits = haystack.matches(term.as_str()).count();
        if hits == 0 {
            return None;
        }
        rank += hits;
    }
    Some(rank)
}

#[async_trait]
impl RecordRepository for InMemoryStore {
    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<Record>> {
        let page = self.paginated_find(filter, Pagination::default()).await?;
        Ok(page.data.into_iter().next())
    }

    async fn paginated_find(
        &self,
        filter: &RecordFilter,
        pagination: Pagination,
    ) -> Result<Page<Record>> {
        let state = self.state.read().await;
        let terms = filter.search_terms();

        let mut ranked: Vec<(usize, &Record)> = state
            .records
            .values()
            .filter(|r| matches_filter(r, filter))
            .filter_map(|r| {
                if terms.is_empty() {
                    Some((0, r))
                } else {
                    search_rank(r, &terms).map(|rank| (rank, r))
                }
            })
            .collect();

        ranked.sort_by(|(rank_a, a), (rank_b, b)| {
            rank_b
                .cmp(rank_a)
                .then(b.created_at.cmp(&a.created_at))
                .then(a.id.cmp(&b.id))
        });

        let total = ranked.len() as u64;
        let data = ranked
            .into_iter()
            .skip(pagination.skip() as usize)
            .take(pagination.limit as usize)
            .map(|(_, r)| r.clone())
            .collect();

        Ok(Page::new(data, total, pagination))
    }

    async fn create(&self, record: NewRecord) -> Result<Record> {
        let record = Record::from_new(record);
        let mut state = self.state.write().await;

        if let Some(existing) = state.find_conflict(&record, None) {
            return Err(StoreError::Duplicate(Box::new(existing.clone())));
        }

        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, id: RecordId, update: RecordUpdate) -> Result<Option<Record>> {
        let mut state = self.state.write().await;

        let Some(mut record) = state.records.get(&id).cloned() else {
            return Ok(None);
        };
        record.apply_update(update);

        if let Some(existing) = state.find_conflict(&record, Some(id)) {
            return Err(StoreError::Duplicate(Box::new(existing.clone())));
        }

        state.records.insert(id, record.clone());
        Ok(Some(record))
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        Ok(self.state.write().await.records.remove(&id).is_some())
    }

    async fn decrement_qty(&self, id: RecordId, delta: u32) -> Result<()> {
        self.state.write().await.decrement(id, delta)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create(&self, order: &Order) -> Result<()> {
        self.state.write().await.orders.push(order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders = state.orders.clone();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl TransactionContext for InMemoryStore {
    type Scope = MemoryScope;

    async fn begin(&self) -> Result<MemoryScope> {
        let inner = match self.mode {
            TransactionMode::Transactional => ScopeInner::Locked {
                guard: self.state.clone().write_owned().await,
                staged_orders: Vec::new(),
                staged_decrements: HashMap::new(),
            },
            TransactionMode::Sequential => ScopeInner::Sequential {
                state: self.state.clone(),
            },
        };
        Ok(MemoryScope {
            inner,
            finished: false,
        })
    }

    fn transaction_mode(&self) -> TransactionMode {
        self.mode
    }
}

enum ScopeInner {
    Locked {
        guard: OwnedRwLockWriteGuard<MemoryState>,
        staged_orders: Vec<Order>,
        staged_decrements: HashMap<RecordId, u32>,
    },
    Sequential {
        state: Arc<RwLock<MemoryState>>,
    },
}

/// Scope over an [`InMemoryStore`].
///
/// In transactional mode writes are staged and only applied on commit; the
/// store lock is held until the scope is dropped.
pub struct MemoryScope {
    inner: ScopeInner,
    finished: bool,
}

#[async_trait]
impl TransactionScope for MemoryScope {
    async fn find_record_for_update(&mut self, id: RecordId) -> Result<Option<Record>> {
        match &self.inner {
            ScopeInner::Locked {
                guard,
                staged_decrements,
                ..
            } => Ok(guard.records.get(&id).cloned().map(|mut record| {
                record.qty -= staged_decrements.get(&id).copied().unwrap_or(0);
                record
            })),
            ScopeInner::Sequential { state } => Ok(state.read().await.records.get(&id).cloned()),
        }
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        match &mut self.inner {
            ScopeInner::Locked { staged_orders, .. } => {
                staged_orders.push(order.clone());
                Ok(())
            }
            ScopeInner::Sequential { state } => {
                state.write().await.orders.push(order.clone());
                Ok(())
            }
        }
    }

    async fn decrement_qty(&mut self, id: RecordId, delta: u32) -> Result<()> {
        match &mut self.inner {
            ScopeInner::Locked {
                guard,
                staged_decrements,
                ..
            } => {
                let record = guard
                    .records
                    .get(&id)
                    .ok_or_else(|| StoreError::NotFound(format!("record {id}")))?;
                let staged = staged_decrements.entry(id).or_insert(0);
                let available = record.qty - *staged;
                if delta > available {
                    return Err(StoreError::StockUnderflow {
                        id,
                        available,
                        requested: delta,
                    });
                }
                *staged += delta;
                Ok(())
            }
            ScopeInner::Sequential { state } => state.write().await.decrement(id, delta),
        }
    }

    async fn commit(mut self) -> Result<()> {
        if let ScopeInner::Locked {
            guard,
            staged_orders,
            staged_decrements,
        } = &mut self.inner
        {
            for (id, delta) in staged_decrements.drain() {
                guard.decrement(id, delta)?;
            }
            let orders = std::mem::take(staged_orders);
            guard.orders.extend(orders);
        }
        self.finished = true;
        Ok(())
    }

    async fn abort(mut self) -> Result<()> {
        if let ScopeInner::Sequential { .. } = self.inner {
            tracing::warn!("sequential scope aborted; writes already applied are kept");
        }
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        if !self.finished
            && let ScopeInner::Locked { staged_orders, .. } = &self.inner
        {
            tracing::debug!(
                staged_orders = staged_orders.len(),
                "scope released without commit, staged writes discarded"
            );
        }
    }
}
