//! Reconnect backoff policy
//!
//! Pure mapping from a 1-based attempt number to the delay before that
//! attempt: `min(base * 2^(attempt-1), cap)`.

use std::time::Duration;

/// Default delay before the first reconnect attempt
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);
/// Default upper bound on any single delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);
/// Default number of reconnect attempts before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Exponential backoff with a cap and an attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    ///
    /// `attempt == 0` is treated like the first attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp_shift = attempt.saturating_sub(1).min(30);
        let base_ms = self.base_delay.as_millis() as u64;
        let raw_ms = base_ms.saturating_mul(1u64 << exp_shift);
        Duration::from_millis(raw_ms).min(self.max_delay)
    }

    /// Whether another attempt is allowed after `count` attempts were made
    pub fn should_retry(&self, count: u32) -> bool {
        count < self.max_attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_ATTEMPTS)
    }
}
