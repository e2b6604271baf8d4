// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Exponential backoff configuration, adapted from this codebase's HTTP
/// retry layer. Unlike that layer, the managers that use this do not loop
/// inline waiting for a retry: `DrinkManager` re-queues a failed post and
/// relies on the next `HeartbeatMinuteEvent` to retry, and `SyncThread`
/// simply waits for its next scheduled tick. This struct exists to give
/// those callers a single place to compute "how long until I try again"
/// when they do want inline backoff (the broker bridge's reconnect loop).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    max_retries: u32,
    initial_delay: Duration,
    jitter: bool,
}

impl RetryConfig {
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            jitter: true,
        }
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_retries_count(&self) -> u32 {
        self.max_retries
    }

    /// Exponential backoff: `initial_delay * 2^(attempt - 1)`, attempt
    /// 1-indexed. With jitter, replaces the result with a uniform random
    /// value between 0 and the calculated delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        if self.jitter {
            let base_nanos = base.as_nanos() as u64;
            if base_nanos == 0 {
                return Duration::ZERO;
            }
            Duration::from_nanos(fastrand::u64(0..base_nanos))
        } else {
            base
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = RetryConfig::new();
        assert_eq!(c.max_retries_count(), 3);
    }

    #[test]
    fn exponential_backoff_without_jitter() {
        let c = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .with_jitter(false);
        assert_eq!(c.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(c.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(c.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let c = RetryConfig::new().initial_delay(Duration::from_millis(100));
        for _ in 0..50 {
            assert!(c.delay_for_attempt(1) <= Duration::from_millis(100));
        }
    }
}
