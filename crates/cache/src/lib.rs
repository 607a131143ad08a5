//! Read-through cache for catalog queries.
//!
//! This crate provides:
//! - [`CacheStore`] capability trait over a key-value backend
//! - [`MemoryStore`] (bounded LRU with lazy TTL expiry) and [`RedisStore`]
//! - [`build_key`] for deterministic list keys
//! - [`CacheLayer`], which serializes JSON values and never lets a cache
//!   fault reach its caller

pub mod error;
pub mod keys;
pub mod layer;
pub mod memory;
pub mod redis_impl;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

pub use error::{CacheError, Result};
pub use keys::{LIST_PREFIX, build_key};
pub use layer::CacheLayer;
pub use memory::MemoryStore;
pub use redis_impl::RedisStore;
pub use store::CacheStore;

/// Default time-to-live for cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default capacity of the in-memory store.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Selects and tunes the cache backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Redis connection URL. `None` selects the in-memory store.
    pub redis_url: Option<String>,
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Builds the cache layer described by `config`.
///
/// A Redis URL that cannot be connected to is an error; there is no silent
/// fallback to the in-memory store.
pub async fn connect(config: &CacheConfig) -> Result<CacheLayer> {
    let store: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => {
            tracing::info!("using redis cache store");
            Arc::new(RedisStore::connect(url).await?)
        }
        None => {
            tracing::info!(max_entries = config.max_entries, "using in-memory cache store");
            Arc::new(MemoryStore::new(config.max_entries)?)
        }
    };
    Ok(CacheLayer::new(store, config.ttl))
}
