use async_trait::async_trait;
use domain::{
    Money, NewRecord, Order, OrderStatus, Page, Pagination, Record, RecordFilter, RecordFormat,
    RecordUpdate, Track,
};
use sqlx::{
    PgConnection, PgExecutor, PgPool, Postgres, Row,
    pool::PoolConnection,
    postgres::PgRow,
};
use uuid::Uuid;

use crate::{
    OrderId, RecordId, Result, StoreError,
    repository::{OrderRepository, RecordRepository},
    transaction::{TransactionContext, TransactionMode, TransactionScope},
};

const RECORD_COLUMNS: &str =
    "id, artist, album, format, price, qty, category, mbid, tracklist, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, record_id, quantity, status, created_at";

const SEARCH_DOCUMENT: &str = "to_tsvector('simple', artist || ' ' || album || ' ' || category)";

/// PostgreSQL-backed record and order store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    mode: TransactionMode,
}

impl PgStore {
    /// Creates a new store with transactional scopes.
    pub fn new(pool: PgPool) -> Self {
        Self::with_mode(pool, TransactionMode::Transactional)
    }

    /// Creates a store with an explicit transaction mode.
    pub fn with_mode(pool: PgPool, mode: TransactionMode) -> Self {
        if mode == TransactionMode::Sequential {
            tracing::warn!(
                "postgres store running in sequential mode; order creation is unsafe under concurrency"
            );
        }
        Self { pool, mode }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Maps a unique violation on the record table to `Duplicate`, looking up
    /// the row that already holds the identity.
    async fn map_write_error(&self, err: sqlx::Error, record: &Record) -> StoreError {
        let is_unique_violation = matches!(
            &err,
            sqlx::Error::Database(db_err)
                if matches!(db_err.constraint(), Some("records_identity_key" | "records_mbid_key"))
        );
        if !is_unique_violation {
            return StoreError::Database(err);
        }

        match find_conflict(&self.pool, record).await {
            Ok(Some(existing)) => StoreError::Duplicate(Box::new(existing)),
            Ok(None) => StoreError::Database(err),
            Err(lookup) => lookup,
        }
    }
}

fn row_to_record(row: PgRow) -> Result<Record> {
    let format: String = row.try_get("format")?;
    let format: RecordFormat = format
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown record format '{format}'")))?;
    let qty: i64 = row.try_get("qty")?;
    let qty = u32::try_from(qty)
        .map_err(|_| StoreError::Corrupt(format!("record quantity {qty} out of range")))?;
    let tracklist: serde_json::Value = row.try_get("tracklist")?;
    let tracklist: Vec<Track> = serde_json::from_value(tracklist)?;

    Ok(Record {
        id: RecordId::from_uuid(row.try_get::<Uuid, _>("id")?),
        artist: row.try_get("artist")?,
        album: row.try_get("album")?,
        format,
        price: Money::from_cents(row.try_get("price")?),
        qty,
        category: row.try_get("category")?,
        mbid: row.try_get("mbid")?,
        tracklist,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let quantity: i64 = row.try_get("quantity")?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        record_id: RecordId::from_uuid(row.try_get::<Uuid, _>("record_id")?),
        quantity: u32::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("order quantity {quantity} out of range")))?,
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        created_at: row.try_get("created_at")?,
    })
}

async fn fetch_record<'e>(
    executor: impl PgExecutor<'e>,
    id: RecordId,
    for_update: bool,
) -> Result<Option<Record>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = $1{lock}");

    sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(executor)
        .await?
        .map(row_to_record)
        .transpose()
}

async fn find_conflict<'e>(executor: impl PgExecutor<'e>, record: &Record) -> Result<Option<Record>> {
    let sql = format!(
        r#"
        SELECT {RECORD_COLUMNS} FROM records
        WHERE id <> $1
          AND ((artist = $2 AND album = $3 AND format = $4)
               OR ($5::text IS NOT NULL AND mbid = $5))
        LIMIT 1
        "#
    );

    sqlx::query(&sql)
        .bind(record.id.as_uuid())
        .bind(&record.artist)
        .bind(&record.album)
        .bind(record.format.as_str())
        .bind(&record.mbid)
        .fetch_optional(executor)
        .await?
        .map(row_to_record)
        .transpose()
}

async fn insert_order<'e>(executor: impl PgExecutor<'e>, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (id, record_id, quantity, status, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(order.id.as_uuid())
    .bind(order.record_id.as_uuid())
    .bind(i64::from(order.quantity))
    .bind(order.status.as_str())
    .bind(order.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

async fn decrement(conn: &mut PgConnection, id: RecordId, delta: u32) -> Result<()> {
    let updated: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE records SET qty = qty - $2, updated_at = NOW()
        WHERE id = $1 AND qty >= $2
        RETURNING qty
        "#,
    )
    .bind(id.as_uuid())
    .bind(i64::from(delta))
    .fetch_optional(&mut *conn)
    .await?;

    if updated.is_some() {
        return Ok(());
    }

    let available: Option<i64> = sqlx::query_scalar("SELECT qty FROM records WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?;

    match available {
        None => Err(StoreError::NotFound(format!("record {id}"))),
        Some(available) => Err(StoreError::StockUnderflow {
            id,
            available: u32::try_from(available).unwrap_or(0),
            requested: delta,
        }),
    }
}

/// Appends the WHERE clause for a filter and returns the values to bind, in
/// placeholder order. Every filter value binds as text.
fn push_filter(sql: &mut String, filter: &RecordFilter) -> Vec<String> {
    let mut binds = Vec::new();
    sql.push_str(" WHERE 1=1");

    let columns = [
        ("artist", filter.artist.clone()),
        ("album", filter.album.clone()),
        ("format", filter.format.map(|f| f.as_str().to_string())),
        ("category", filter.category.clone()),
        ("mbid", filter.mbid.clone()),
    ];
    for (column, value) in columns {
        if let Some(value) = value {
            binds.push(value);
            sql.push_str(&format!(" AND {column} = ${}", binds.len()));
        }
    }

    if let Some(search) = &filter.search {
        binds.push(search.clone());
        sql.push_str(&format!(
            " AND {SEARCH_DOCUMENT} @@ plainto_tsquery('simple', ${})",
            binds.len()
        ));
    }

    binds
}

#[async_trait]
impl RecordRepository for PgStore {
    async fn find_by_id(&self, id: RecordId) -> Result<Option<Record>> {
        fetch_record(&self.pool, id, false).await
    }

    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<Record>> {
        let page = self.paginated_find(filter, Pagination::default()).await?;
        Ok(page.data.into_iter().next())
    }

    #[tracing::instrument(skip(self))]
    async fn paginated_find(
        &self,
        filter: &RecordFilter,
        pagination: Pagination,
    ) -> Result<Page<Record>> {
        let mut count_sql = String::from("SELECT COUNT(*) FROM records");
        let binds = push_filter(&mut count_sql, filter);

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for value in &binds {
            count_query = count_query.bind(value);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM records");
        let binds = push_filter(&mut sql, filter);
        if filter.search.is_some() {
            // The search term is always the last bound filter value.
            sql.push_str(&format!(
                " ORDER BY ts_rank({SEARCH_DOCUMENT}, plainto_tsquery('simple', ${})) DESC, created_at DESC, id ASC",
                binds.len()
            ));
        } else {
            sql.push_str(" ORDER BY created_at DESC, id ASC");
        }
        sql.push_str(&format!(
            " LIMIT ${} OFFSET ${}",
            binds.len() + 1,
            binds.len() + 2
        ));

        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = query.bind(value);
        }
        let rows = query
            .bind(i64::from(pagination.limit))
            .bind(pagination.skip() as i64)
            .fetch_all(&self.pool)
            .await?;

        let data = rows
            .into_iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(data, total.max(0) as u64, pagination))
    }

    async fn create(&self, record: NewRecord) -> Result<Record> {
        let record = Record::from_new(record);
        let tracklist = serde_json::to_value(&record.tracklist)?;

        let result = sqlx::query(
            r#"
            INSERT INTO records (id, artist, album, format, price, qty, category, mbid, tracklist, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.artist)
        .bind(&record.album)
        .bind(record.format.as_str())
        .bind(record.price.cents())
        .bind(i64::from(record.qty))
        .bind(&record.category)
        .bind(&record.mbid)
        .bind(tracklist)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record),
            Err(err) => Err(self.map_write_error(err, &record).await),
        }
    }

    async fn update(&self, id: RecordId, update: RecordUpdate) -> Result<Option<Record>> {
        let mut tx = self.pool.begin().await?;

        let Some(mut record) = fetch_record(&mut *tx, id, true).await? else {
            return Ok(None);
        };
        record.apply_update(update);
        let tracklist = serde_json::to_value(&record.tracklist)?;

        let result = sqlx::query(
            r#"
            UPDATE records
            SET artist = $2, album = $3, format = $4, price = $5, qty = $6,
                category = $7, mbid = $8, tracklist = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.artist)
        .bind(&record.album)
        .bind(record.format.as_str())
        .bind(record.price.cents())
        .bind(i64::from(record.qty))
        .bind(&record.category)
        .bind(&record.mbid)
        .bind(tracklist)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {
                tx.commit().await?;
                Ok(Some(record))
            }
            Err(err) => {
                // The failed statement poisons the transaction; release it
                // before looking up the conflicting row.
                tx.rollback().await?;
                Err(self.map_write_error(err, &record).await)
            }
        }
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM records WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn decrement_qty(&self, id: RecordId, delta: u32) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        decrement(&mut conn, id, delta).await
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn create(&self, order: &Order) -> Result<()> {
        insert_order(&self.pool, order).await
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_order)
            .transpose()
    }

    async fn find_all(&self) -> Result<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_order).collect()
    }
}

#[async_trait]
impl TransactionContext for PgStore {
    type Scope = PgScope;

    async fn begin(&self) -> Result<PgScope> {
        let inner = match self.mode {
            TransactionMode::Transactional => PgScopeInner::Transaction(self.pool.begin().await?),
            TransactionMode::Sequential => PgScopeInner::Sequential(self.pool.acquire().await?),
        };
        Ok(PgScope {
            inner,
            finished: false,
        })
    }

    fn transaction_mode(&self) -> TransactionMode {
        self.mode
    }
}

enum PgScopeInner {
    Transaction(sqlx::Transaction<'static, Postgres>),
    Sequential(PoolConnection<Postgres>),
    Finished,
}

/// Scope over a [`PgStore`].
///
/// Transactional scopes wrap a database transaction; the record read with
/// [`TransactionScope::find_record_for_update`] stays row-locked until the
/// transaction ends. Dropping an unfinished scope rolls the transaction back
/// and returns the connection to the pool.
pub struct PgScope {
    inner: PgScopeInner,
    finished: bool,
}

impl PgScope {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        match &mut self.inner {
            PgScopeInner::Transaction(tx) => Ok(&mut **tx),
            PgScopeInner::Sequential(conn) => Ok(&mut **conn),
            PgScopeInner::Finished => Err(StoreError::ScopeFinished),
        }
    }
}

#[async_trait]
impl TransactionScope for PgScope {
    async fn find_record_for_update(&mut self, id: RecordId) -> Result<Option<Record>> {
        let for_update = matches!(self.inner, PgScopeInner::Transaction(_));
        fetch_record(self.conn()?, id, for_update).await
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        insert_order(self.conn()?, order).await
    }

    async fn decrement_qty(&mut self, id: RecordId, delta: u32) -> Result<()> {
        decrement(self.conn()?, id, delta).await
    }

    async fn commit(mut self) -> Result<()> {
        self.finished = true;
        let inner = std::mem::replace(&mut self.inner, PgScopeInner::Finished);
        if let PgScopeInner::Transaction(tx) = inner {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn abort(mut self) -> Result<()> {
        self.finished = true;
        let inner = std::mem::replace(&mut self.inner, PgScopeInner::Finished);
        match inner {
            PgScopeInner::Transaction(tx) => tx.rollback().await?,
            PgScopeInner::Sequential(_) => {
                tracing::warn!("sequential scope aborted; writes already applied are kept")
            }
            PgScopeInner::Finished => {}
        }
        Ok(())
    }
}

impl Drop for PgScope {
    fn drop(&mut self) {
        if !self.finished && matches!(self.inner, PgScopeInner::Transaction(_)) {
            tracing::debug!("scope released without commit, transaction rolled back");
        }
    }
}
