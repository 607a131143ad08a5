//! Application configuration loaded from environment variables.

use std::time::Duration;

use cache::CacheConfig;
use catalog::musicbrainz::DEFAULT_BASE_URL;
use retry::RetryConfig;
use store::TransactionMode;

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset selects the in-memory store
/// - `STORE_TRANSACTIONS`: `transactional` or `sequential` (default: `transactional`)
/// - `REDIS_URL`: Redis URL; unset selects the in-process cache
/// - `CACHE_TTL_SECONDS`: listing cache TTL (default: `60`)
/// - `CACHE_MAX_ENTRIES`: in-process cache bound (default: `10000`)
/// - `METADATA_BASE_URL`: metadata web service root (default: MusicBrainz)
/// - `METADATA_TIMEOUT_MS`: per-request provider timeout (default: `10000`)
/// - `RETRY_MAX_ATTEMPTS`: provider attempts per write (default: `3`)
/// - `RETRY_MAX_DURATION_MS`: provider retry budget (default: `30000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub transaction_mode: TransactionMode,
    pub cache: CacheConfig,
    pub metadata_base_url: String,
    pub metadata_timeout: Duration,
    pub retry: RetryConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let transaction_mode = lookup("STORE_TRANSACTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.transaction_mode);

        let mut retry = defaults.retry.clone();
        if let Some(attempts) = parsed("RETRY_MAX_ATTEMPTS") {
            retry = retry.with_max_attempts(u32::try_from(attempts).unwrap_or(u32::MAX));
        }
        if let Some(ms) = parsed("RETRY_MAX_DURATION_MS") {
            retry = retry.with_max_duration(Duration::from_millis(ms));
        }

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            database_url: non_empty("DATABASE_URL"),
            transaction_mode,
            cache: CacheConfig {
                redis_url: non_empty("REDIS_URL"),
                ttl: parsed("CACHE_TTL_SECONDS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.ttl),
                max_entries: parsed("CACHE_MAX_ENTRIES")
                    .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
                    .unwrap_or(defaults.cache.max_entries),
            },
            metadata_base_url: non_empty("METADATA_BASE_URL").unwrap_or(defaults.metadata_base_url),
            metadata_timeout: parsed("METADATA_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.metadata_timeout),
            retry,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            transaction_mode: TransactionMode::Transactional,
            cache: CacheConfig::default(),
            metadata_base_url: DEFAULT_BASE_URL.to_string(),
            metadata_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert!(config.cache.redis_url.is_none());
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reads_backend_selection() {
        let config = from_vars(&[
            ("DATABASE_URL", "postgres://localhost/records"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("STORE_TRANSACTIONS", "sequential"),
            ("LOG_FORMAT", "JSON"),
        ]);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/records")
        );
        assert_eq!(
            config.cache.redis_url.as_deref(),
            Some("redis://localhost:6379")
        );
        assert_eq!(config.transaction_mode, TransactionMode::Sequential);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_reads_tuning_values() {
        let config = from_vars(&[
            ("CACHE_TTL_SECONDS", "5"),
            ("CACHE_MAX_ENTRIES", "50"),
            ("METADATA_TIMEOUT_MS", "250"),
            ("RETRY_MAX_ATTEMPTS", "7"),
            ("RETRY_MAX_DURATION_MS", "1500"),
        ]);
        assert_eq!(config.cache.ttl, Duration::from_secs(5));
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.metadata_timeout, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.retry.max_duration, Duration::from_millis(1500));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_vars(&[
            ("PORT", "http"),
            ("CACHE_TTL_SECONDS", "soon"),
            ("STORE_TRANSACTIONS", "maybe"),
            ("DATABASE_URL", "  "),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.transaction_mode, TransactionMode::Transactional);
        assert!(config.database_url.is_none());
    }
}
