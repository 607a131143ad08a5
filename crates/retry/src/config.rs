use std::time::Duration;

/// Attempt and time budget for a retried operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of invocations, including the first.
    pub max_attempts: u32,
    /// Budget measured from the first attempt; no new attempt starts after it
    /// is spent.
    pub max_duration: Duration,
    /// Delay before the second attempt. Doubles on every further attempt.
    pub base_delay: Duration,
    /// Upper bound on a single delay.
    pub max_delay: Duration,
    /// Relative jitter applied to each delay, e.g. `0.1` for ±10%.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_duration: Duration::from_secs(30),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}
