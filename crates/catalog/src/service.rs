//! Record catalog service.

use cache::{CacheLayer, LIST_PREFIX, build_key};
use common::RecordId;
use domain::{NewRecord, Page, Pagination, Record, RecordFilter, RecordUpdate, Track};
use retry::RetryEngine;
use store::RecordRepository;

use crate::error::{CatalogError, Result};
use crate::provider::MetadataProvider;

/// Label under which provider calls are retried and counted.
const PROVIDER_LABEL: &str = "metadata-provider";

/// Catalog reads and writes over a record repository.
///
/// Listings are served through the cache; every successful write
/// invalidates all cached listings before returning. Records created or
/// re-pointed at an mbid get their tracklist from the metadata provider.
pub struct RecordCatalogService<R, P>
where
    R: RecordRepository,
    P: MetadataProvider,
{
    repo: R,
    cache: CacheLayer,
    retry: RetryEngine,
    provider: P,
}

impl<R, P> RecordCatalogService<R, P>
where
    R: RecordRepository,
    P: MetadataProvider,
{
    pub fn new(repo: R, cache: CacheLayer, retry: RetryEngine, provider: P) -> Self {
        Self {
            repo,
            cache,
            retry,
            provider,
        }
    }

    /// Returns one page of records, from the cache when possible.
    #[tracing::instrument(skip(self))]
    pub async fn find_all(
        &self,
        filter: RecordFilter,
        pagination: Pagination,
    ) -> Result<Page<Record>> {
        let filter = filter.normalized();
        let key = build_key(&filter, &pagination);

        if let Some(page) = self.cache.get_json::<Page<Record>>(&key).await {
            return Ok(page);
        }

        let page = self.repo.paginated_find(&filter, pagination).await?;
        self.cache.set_json(&key, &page).await;
        Ok(page)
    }

    /// Retrieves a record by id.
    pub async fn find_by_id(&self, id: RecordId) -> Result<Record> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Creates a record.
    ///
    /// Fails with [`CatalogError::Conflict`] when the identity triple or the
    /// mbid is already taken. With an mbid, the tracklist is replaced by the
    /// provider's; a provider failure aborts the create.
    #[tracing::instrument(skip(self, record), fields(artist = %record.artist, album = %record.album))]
    pub async fn create(&self, record: NewRecord) -> Result<Record> {
        let mut record = record.validate()?;

        let identity = RecordFilter::new()
            .artist(record.artist.clone())
            .album(record.album.clone())
            .format(record.format);
        if let Some(existing) = self.repo.find_one(&identity).await? {
            return Err(CatalogError::Conflict(Box::new(existing)));
        }
        if let Some(mbid) = record.mbid.as_deref() {
            if let Some(existing) = self.repo.find_one(&RecordFilter::new().mbid(mbid)).await? {
                return Err(CatalogError::Conflict(Box::new(existing)));
            }
            record.tracklist = self.fetch_tracklist(mbid).await?;
        }

        let created = self.repo.create(record).await?;
        self.cache.invalidate_all(LIST_PREFIX).await;
        tracing::info!(record_id = %created.id, "record created");
        Ok(created)
    }

    /// Applies a partial update.
    ///
    /// The tracklist is refreshed from the provider only when the update
    /// points the record at a different mbid.
    #[tracing::instrument(skip(self, update))]
    pub async fn update(&self, id: RecordId, update: RecordUpdate) -> Result<Record> {
        let mut update = update.validate()?;
        let current = self.find_by_id(id).await?;

        let new_mbid = update
            .mbid
            .clone()
            .filter(|mbid| current.mbid.as_ref() != Some(mbid));
        if let Some(mbid) = new_mbid {
            update.tracklist = Some(self.fetch_tracklist(&mbid).await?);
        }

        let updated = self
            .repo
            .update(id, update)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        self.cache.invalidate_all(LIST_PREFIX).await;
        tracing::info!(record_id = %id, "record updated");
        Ok(updated)
    }

    /// Deletes a record.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: RecordId) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        self.cache.invalidate_all(LIST_PREFIX).await;
        tracing::info!(record_id = %id, "record deleted");
        Ok(())
    }

    async fn fetch_tracklist(&self, mbid: &str) -> Result<Vec<Track>> {
        let release = self
            .retry
            .execute_with_retry(PROVIDER_LABEL, || self.provider.get_release_by_id(mbid))
            .await?;
        tracing::debug!(mbid, title = %release.title, "release metadata fetched");
        Ok(release.tracklist())
    }
}
