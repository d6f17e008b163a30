//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between periodic drain attempts.
    pub drain_interval: Duration,
    /// Delivery attempts per queue item before it is marked failed.
    pub max_item_retries: u32,
    /// Bounded timeout transport implementations must apply per request.
    pub request_timeout: Duration,
    /// Retry behavior for backup and restore calls.
    pub retry: RetryConfig,
    /// Whether enabling sync performs an immediate full backup.
    pub backup_on_enable: bool,
}

impl SyncConfig {
    /// Creates a configuration with the default five-minute drain
    /// interval.
    #[must_use]
    pub fn new() -> Self {
        Self {
            drain_interval: Duration::from_secs(5 * 60),
            max_item_retries: 3,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            backup_on_enable: true,
        }
    }

    /// Sets the periodic drain interval.
    #[must_use]
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Sets the per-item retry budget.
    #[must_use]
    pub fn with_max_item_retries(mut self, retries: u32) -> Self {
        self.max_item_retries = retries;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Disables the automatic full backup on enable.
    #[must_use]
    pub fn without_backup_on_enable(mut self) -> Self {
        self.backup_on_enable = false;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% random jitter to each delay.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration with the given attempt budget.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// A configuration that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables jitter, for deterministic tests.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Calculates the delay before the given attempt (0-indexed).
    ///
    /// Attempt 0 has no delay; later attempts back off exponentially up
    /// to `max_delay`, with optional jitter on top.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            use rand::Rng;
            let jitter = capped * 0.25 * rand::thread_rng().gen::<f64>();
            Duration::from_secs_f64(capped + jitter)
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_drain_interval(Duration::from_secs(60))
            .with_max_item_retries(5)
            .with_request_timeout(Duration::from_secs(10))
            .without_backup_on_enable();

        assert_eq!(config.drain_interval, Duration::from_secs(60));
        assert_eq!(config.max_item_retries, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(!config.backup_on_enable);
    }

    #[test]
    fn default_drain_interval_is_five_minutes() {
        assert_eq!(SyncConfig::default().drain_interval, Duration::from_secs(300));
        assert_eq!(SyncConfig::default().max_item_retries, 3);
    }

    #[test]
    fn no_retry_budget() {
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
    }

    #[test]
    fn backoff_growth() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .without_jitter();

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn backoff_respects_max_delay() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .without_jitter();

        assert_eq!(config.delay_for_attempt(6), Duration::from_secs(5));
    }

    #[test]
    fn jitter_stays_bounded() {
        let config = RetryConfig::new(3).with_initial_delay(Duration::from_millis(100));

        for _ in 0..20 {
            let delay = config.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(125));
        }
    }
}
