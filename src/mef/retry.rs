use std::time::Duration;

use crate::config::RetryConfig;

/// Bounded exponential backoff for transmission failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 1,
            next_delay: self.initial_backoff.min(self.max_backoff),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
        }
    }
}

/// Backoff state for one request.
///
/// Each call to [`Backoff::next`] consumes one retry and yields the delay
/// to wait before it, or `None` once the attempts are exhausted.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
    next_delay: Duration,
}

impl Backoff {
    /// Attempts made so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        self.attempt += 1;
        let delay = self.next_delay;
        let grown = delay.as_secs_f64() * self.policy.multiplier.max(1.0);
        // overflowing or non-finite growth saturates at the cap
        self.next_delay = Duration::try_from_secs_f64(grown)
            .map_or(self.policy.max_backoff, |grown| grown.min(self.policy.max_backoff));
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
            multiplier: 2.0,
        };
        let mut backoff = policy.backoff();

        assert_eq!(backoff.next(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.next(), Some(Duration::from_millis(300)));
        assert_eq!(backoff.attempt(), 5);
        assert_eq!(backoff.next(), None);
        assert_eq!(backoff.next(), None);
    }

    #[test]
    fn test_huge_multiplier_saturates_at_cap() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::MAX,
            multiplier: f64::MAX,
        };
        let mut backoff = policy.backoff();

        assert_eq!(backoff.next(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next(), Some(Duration::MAX));
        assert_eq!(backoff.next(), Some(Duration::MAX));
        assert_eq!(backoff.next(), None);
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let mut backoff = RetryPolicy::none().backoff();
        assert_eq!(backoff.next(), None);
        assert_eq!(backoff.attempt(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig {
            max_attempts: 0,
            initial_backoff_ms: 250,
            max_backoff_ms: 1000,
            multiplier: 3.0,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.initial_backoff, Duration::from_millis(250));
        assert_eq!(policy.max_backoff, Duration::from_secs(1));
    }
}
