use std::time::Duration;

use async_trait::async_trait;

use crate::{CacheError, Result};

/// Key-value backend behind the cache layer.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Gets a value by key. Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value that expires after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Deletes a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Lists the keys starting with `prefix`.
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let _ = prefix;
        Err(CacheError::Unsupported("scan_keys"))
    }

    /// Removes every entry in the store.
    async fn flush_all(&self) -> Result<()>;
}
