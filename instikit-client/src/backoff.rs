//! Rate-limit retry schedule
//!
//! A pure description of when a throttled request may be retried. The
//! pipeline asks `delay_for` after every 429; the answer depends only on the
//! attempt number and the server's Retry-After hint, so the arithmetic is
//! unit testable without a transport or a clock. Jitter is applied
//! separately, right before sleeping.

use instikit_core::RetryConfig;
use std::time::Duration;

/// Backoff policy for one logical request
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub base: Duration,
    /// Maximum automatic retries; the request is attempted at most
    /// `max_retries + 1` times
    pub max_retries: u32,
    /// Upper bound of the random jitter added to each delay
    pub jitter_cap: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            max_retries: config.max_retries,
            jitter_cap: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based, counting completed
    /// attempts), or None once the retry budget is spent.
    ///
    /// The schedule doubles from `base`; a server-supplied Retry-After only
    /// ever raises the delay, never shortens it.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let exponential = self.base * 2u32.pow(attempt - 1);
        Some(exponential.max(retry_after.unwrap_or(Duration::ZERO)))
    }

    /// Random jitter in `0..=jitter_cap`, spreading concurrent retries out.
    pub fn jitter(&self) -> Duration {
        Duration::from_millis(fastrand::u64(0..=self.jitter_cap.as_millis() as u64))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            max_retries: 3,
            jitter_cap: Duration::from_millis(500),
        }
    }
}
