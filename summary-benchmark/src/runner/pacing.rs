//! Call pacing and retry backoff

use std::time::Duration;

use crate::config::GenerationConfig;

/// Fixed pause after every generation call
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// No pause at all
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Retry count and backoff for generation calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retry_count: u32,
    /// Delay before the first retry in milliseconds
    pub retry_delay_ms: u64,
    /// Upper bound on the doubled delay
    pub max_retry_delay_ms: u64,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            retry_delay_ms: config.retry_delay_ms,
            max_retry_delay_ms: config.max_retry_delay_ms,
            timeout_ms: config.timeout_ms,
        }
    }

    /// Single attempt, no waiting; for tests and dry runs
    pub fn no_retry() -> Self {
        Self {
            retry_count: 0,
            retry_delay_ms: 0,
            max_retry_delay_ms: 0,
            timeout_ms: 60_000,
        }
    }

    /// Delay before retry number `retry` (1-based): doubles each time, capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(32);
        let ms = self
            .retry_delay_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms.max(self.retry_delay_ms));
        Duration::from_millis(ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            retry_count: 5,
            retry_delay_ms: 5000,
            max_retry_delay_ms: 15_000,
            timeout_ms: 1000,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(15_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(15_000));
    }

    #[test]
    fn test_defaults_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retry_count, 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_disabled_pacer_returns_immediately() {
        let pacer = Pacer::disabled();
        assert!(pacer.delay().is_zero());
        let start = std::time::Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_sleeps() {
        let pacer = Pacer::from_millis(1000);
        assert_eq!(pacer.delay(), Duration::from_millis(1000));
        let start = tokio::time::Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
