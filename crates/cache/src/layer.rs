use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use crate::{CacheError, CacheStore};

/// JSON read-through cache over a [`CacheStore`].
///
/// Every operation swallows store failures: they are logged, counted in
/// `cache_errors_total`, and reported to the caller as a miss or a no-op.
#[derive(Clone)]
pub struct CacheLayer {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Time-to-live applied to every entry written through this layer.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reads and decodes a cached value.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                metrics::counter!("cache_misses_total").increment(1);
                return None;
            }
            Err(e) => {
                record_error("get", &e);
                metrics::counter!("cache_misses_total").increment(1);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                metrics::counter!("cache_hits_total").increment(1);
                Some(value)
            }
            Err(e) => {
                record_error("decode", &CacheError::from(e));
                metrics::counter!("cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Encodes and stores a value with the configured TTL.
    #[tracing::instrument(skip(self, value))]
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                record_error("encode", &CacheError::from(e));
                return;
            }
        };

        if let Err(e) = self.store.set(key, &bytes, self.ttl).await {
            record_error("set", &e);
        }
    }

    /// Removes one entry.
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            record_error("delete", &e);
        }
    }

    /// Removes every entry whose key starts with `prefix`.
    ///
    /// Stores that cannot list keys are flushed entirely instead.
    #[tracing::instrument(skip(self))]
    pub async fn invalidate_all(&self, prefix: &str) {
        metrics::counter!("cache_invalidations_total").increment(1);

        let keys = match self.store.scan_keys(prefix).await {
            Ok(keys) => keys,
            Err(CacheError::Unsupported(_)) => {
                tracing::debug!("cache store cannot scan keys, flushing");
                if let Err(e) = self.store.flush_all().await {
                    record_error("flush_all", &e);
                }
                return;
            }
            Err(e) => {
                record_error("scan_keys", &e);
                return;
            }
        };

        tracing::debug!(count = keys.len(), "invalidating cached entries");
        for key in keys {
            if let Err(e) = self.store.delete(&key).await {
                record_error("delete", &e);
            }
        }
    }
}

fn record_error(operation: &'static str, err: &CacheError) {
    metrics::counter!("cache_errors_total", "operation" => operation).increment(1);
    tracing::warn!(operation, error = %err, "cache operation failed, continuing without cache");
}
