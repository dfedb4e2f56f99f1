//! Retry policy for the optimistic update loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds the optimistic retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts before giving up, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Sleep after the first conflict; doubles on each further conflict.
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,
    /// Upper bound for a single sleep.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    32
}

fn default_base_backoff() -> u64 {
    2
}

fn default_max_backoff() -> u64 {
    100
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Retry immediately, up to `max_attempts` times.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Sleep to take after `conflicts` consecutive conflicts (1-based).
    pub fn backoff(&self, conflicts: u32) -> Duration {
        let shift = conflicts.saturating_sub(1).min(20);
        let millis = self
            .base_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_backoff_ms: 5,
            max_backoff_ms: 30,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(5));
        assert_eq!(policy.backoff(2), Duration::from_millis(10));
        assert_eq!(policy.backoff(3), Duration::from_millis(20));
        assert_eq!(policy.backoff(4), Duration::from_millis(30));
        assert_eq!(policy.backoff(60), Duration::from_millis(30));
    }

    #[test]
    fn test_immediate_policy_never_sleeps() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.backoff(1), Duration::ZERO);
        assert_eq!(policy.backoff(9), Duration::ZERO);
    }
}
