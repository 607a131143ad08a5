use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::{ClassifiedError, RetryConfig, UpstreamError};

/// Delay before the attempt following `attempt`, without jitter.
///
/// `base_delay × 2^(attempt−1)`, capped at `max_delay`.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    config
        .base_delay
        .saturating_mul(factor)
        .min(config.max_delay)
}

fn with_jitter(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let factor = 1.0 + rand::rng().random_range(-jitter..=jitter);
    delay.mul_f64(factor.max(0.0))
}

/// Runs operations against external services with bounded retries.
#[derive(Debug, Clone, Default)]
pub struct RetryEngine {
    config: RetryConfig,
}

impl RetryEngine {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` with the engine's configuration.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        label: &str,
        operation: F,
    ) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClassifiedError>>,
    {
        self.execute_with_config(label, &self.config, operation)
            .await
    }

    /// Runs `operation` until it succeeds, fails fatally, or the budget in
    /// `config` is spent.
    ///
    /// An attempt in flight is never cancelled; the time budget only decides
    /// whether another attempt may start.
    #[tracing::instrument(skip(self, config, operation))]
    pub async fn execute_with_config<T, F, Fut>(
        &self,
        label: &str,
        config: &RetryConfig,
        mut operation: F,
    ) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClassifiedError>>,
    {
        let max_attempts = config.max_attempts.max(1);
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            metrics::counter!("retry_attempts_total", "service" => label.to_string()).increment(1);

            let err = match operation().await {
                Ok(value) => {
                    tracing::debug!(attempts = attempt, "operation succeeded");
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::warn!(attempt, status = ?err.status(), error = %err, "fatal failure, not retrying");
                return Err(UpstreamError::from_classified(label, &err, attempt));
            }
            if attempt >= max_attempts {
                return Err(exhausted(label, &err, attempt));
            }

            let remaining = config.max_duration.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(exhausted(label, &err, attempt));
            }

            let delay = with_jitter(backoff_delay(config, attempt), config.jitter).min(remaining);
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retryable failure, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn exhausted(label: &str, err: &ClassifiedError, attempts: u32) -> UpstreamError {
    metrics::counter!("retry_exhausted_total", "service" => label.to_string()).increment(1);
    tracing::error!(attempts, error = %err, "retry budget exhausted");
    UpstreamError::from_classified(label, err, attempts)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::TransportKind;

    fn counting() -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (calls.clone(), calls)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(backoff_delay(&config, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(&config, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(&config, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(&config, 5), Duration::from_secs(10));
        assert_eq!(backoff_delay(&config, 40), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            let delay = with_jitter(Duration::from_millis(1000), 0.1);
            assert!(delay >= Duration::from_millis(900));
            assert!(delay <= Duration::from_millis(1100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transport_failures_until_success() {
        let engine = RetryEngine::default();
        let (calls, counter) = counting();

        let result = engine
            .execute_with_retry("provider", || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(ClassifiedError::transport(
                            TransportKind::ConnectionRefused,
                            "connection refused",
                        ))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failure_is_attempted_once() {
        let engine = RetryEngine::default();
        let (calls, counter) = counting();

        let err = engine
            .execute_with_retry("provider", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ClassifiedError::from_status(
                        404,
                        Some("release not found".to_string()),
                    ))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.status, 404);
        assert_eq!(err.attempts, 1);
        assert_eq!(err.service, "provider");
        assert_eq!(err.message, "release not found");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_transport_failure_maps_to_503() {
        let engine = RetryEngine::default();
        let (calls, counter) = counting();

        let err = engine
            .execute_with_retry("provider", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ClassifiedError::transport(TransportKind::Timeout, "timed out"))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.status, 503);
        assert_eq!(err.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn time_budget_stops_before_max_attempts() {
        let config = RetryConfig::default()
            .with_max_attempts(5)
            .with_max_duration(Duration::from_millis(1500))
            .with_jitter(0.0);
        let engine = RetryEngine::new(config);
        let (calls, counter) = counting();
        let started = Instant::now();

        let err = engine
            .execute_with_retry("provider", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ClassifiedError::from_status(503, None))
                }
            })
            .await
            .unwrap_err();

        // Sleeps of 1s then 0.5s (clamped) leave no budget for a fourth call.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.status, 503);
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_config_overrides_engine_config() {
        let engine = RetryEngine::default();
        let (calls, counter) = counting();
        let config = RetryConfig::default().with_max_attempts(1);

        let err = engine
            .execute_with_config("provider", &config, || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ClassifiedError::from_status(502, None))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.status, 502);
    }
}
