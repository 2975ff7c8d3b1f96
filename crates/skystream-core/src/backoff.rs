//! Reconnect policy and backoff calculation.
//!
//! Portable, sync-only building blocks. The timer that actually waits lives in
//! `skystream-client`, which owns the tokio runtime handles.
//!
//! - [`ReconnectPolicy`]: whether to reconnect, how often, how long to wait
//! - [`calculate_backoff_delay`]: capped exponential backoff

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default delay before the first reconnect in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
/// Default ceiling on a single reconnect delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// When and how the client retries after losing its connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectPolicy {
    /// Reconnect automatically after the transport closes.
    pub enabled: bool,
    /// Attempt budget. `0` means unlimited.
    pub max_attempts: u32,
    /// Delay before the first attempt (ms).
    pub initial_delay_ms: u64,
    /// Ceiling on any single delay (ms).
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `attempts_made` attempts.
    pub fn allows_attempt(&self, attempts_made: u32) -> bool {
        self.max_attempts == 0 || attempts_made < self.max_attempts
    }

    /// Delay before the attempt with zero-based index `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            attempt,
            self.initial_delay_ms,
            self.max_delay_ms,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Capped exponential backoff: `min(initial_delay_ms * 2^attempt, max_delay_ms)`.
///
/// `attempt` is zero-based, so the first retry waits `initial_delay_ms`.
/// Saturates instead of overflowing for large attempt counts.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, initial_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = initial_delay_ms.saturating_mul(1u64 << attempt.min(31));
    exponential.min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn policy_defaults() {
        let policy = ReconnectPolicy::default();
        assert!(policy.enabled);
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.initial_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 30_000);
    }

    #[test]
    fn policy_serde_defaults() {
        let policy: ReconnectPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, ReconnectPolicy::default());
    }

    #[test]
    fn policy_serde_camel_case() {
        let policy: ReconnectPolicy =
            serde_json::from_str(r#"{"maxAttempts": 0, "initialDelayMs": 50}"#).unwrap();
        assert_eq!(policy.max_attempts, 0);
        assert_eq!(policy.initial_delay_ms, 50);
        assert_eq!(policy.max_delay_ms, 30_000);
    }

    #[test]
    fn delays_for_first_attempts() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=7u32)
            .map(|n| u64::try_from(policy.delay(n - 1).as_millis()).unwrap())
            .collect();
        assert_eq!(delays, [1000, 2000, 4000, 8000, 16_000, 30_000, 30_000]);
    }

    #[test]
    fn zero_max_attempts_is_unlimited() {
        let policy = ReconnectPolicy {
            max_attempts: 0,
            ..ReconnectPolicy::default()
        };
        assert!(policy.allows_attempt(0));
        assert!(policy.allows_attempt(u32::MAX));
    }

    #[test]
    fn bounded_attempts() {
        let policy = ReconnectPolicy {
            max_attempts: 3,
            ..ReconnectPolicy::default()
        };
        assert!(policy.allows_attempt(0));
        assert!(policy.allows_attempt(2));
        assert!(!policy.allows_attempt(3));
    }

    #[test]
    fn disabled_policy() {
        assert!(!ReconnectPolicy::disabled().enabled);
    }

    #[test]
    fn backoff_high_attempt_no_overflow() {
        assert_eq!(calculate_backoff_delay(100, 1000, 30_000), 30_000);
        assert_eq!(calculate_backoff_delay(63, u64::MAX / 2, u64::MAX), u64::MAX);
    }

    proptest! {
        #[test]
        fn backoff_never_exceeds_cap(attempt in 0u32..200, initial in 1u64..100_000, cap in 1u64..1_000_000) {
            prop_assert!(calculate_backoff_delay(attempt, initial, cap) <= cap);
        }

        #[test]
        fn backoff_is_monotonic(attempt in 0u32..100, initial in 1u64..10_000, cap in 1u64..1_000_000) {
            let a = calculate_backoff_delay(attempt, initial, cap);
            let b = calculate_backoff_delay(attempt + 1, initial, cap);
            prop_assert!(b >= a);
        }
    }
}
