//! Reconnect scheduling.
//!
//! The default policy retries forever after a fixed delay, with no backoff
//! and no jitter. A bounded exponential policy is available for deployments
//! that want to cap reconnect storms.

use std::time::Duration;

/// Delay between reconnect attempts under the default policy.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;

/// Largest exponent applied by the exponential policy.
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// How the supervisor schedules reconnect attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay after every disconnect, indefinitely.
    Fixed { delay_ms: u64 },
    /// Exponential backoff with jitter and an optional attempt cap.
    ExponentialBackoff {
        /// Delay of the first attempt.
        base_delay_ms: u64,
        /// Upper bound on the delay (before jitter).
        max_delay_ms: u64,
        /// Maximum reconnect attempts (0 = infinite).
        max_attempts: u32,
        /// Upper bound of random jitter added to each delay.
        jitter_ms: u64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed {
            delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (1-based).
    ///
    /// Returns `None` when the policy gives up.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Fixed { delay_ms } => Some(Duration::from_millis(delay_ms)),
            Self::ExponentialBackoff {
                base_delay_ms,
                max_delay_ms,
                max_attempts,
                jitter_ms,
            } => {
                if max_attempts > 0 && attempt > max_attempts {
                    return None;
                }

                // attempt=1 -> base, attempt=2 -> 2*base, attempt=3 -> 4*base
                let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
                let delay = base_delay_ms.saturating_mul(1u64 << exponent);
                let delay = delay.min(max_delay_ms);

                Some(Duration::from_millis(delay.saturating_add(rand_jitter(jitter_ms))))
            }
        }
    }

    /// Whether this policy ever stops reconnecting.
    pub fn is_bounded(&self) -> bool {
        matches!(self, Self::ExponentialBackoff { max_attempts, .. } if *max_attempts > 0)
    }
}

/// Random jitter in `[0, max_ms)`.
fn rand_jitter(max_ms: u64) -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    if max_ms == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos) % max_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fixed_three_seconds() {
        assert_eq!(
            ReconnectPolicy::default(),
            ReconnectPolicy::Fixed { delay_ms: 3000 }
        );
        assert!(!ReconnectPolicy::default().is_bounded());
    }

    #[test]
    fn test_fixed_delay_never_changes_or_gives_up() {
        let policy = ReconnectPolicy::Fixed { delay_ms: 3000 };
        for attempt in [1, 2, 10, 1_000, u32::MAX] {
            assert_eq!(
                policy.next_delay(attempt),
                Some(Duration::from_millis(3000))
            );
        }
    }

    #[test]
    fn test_exponential_doubles_until_cap() {
        let policy = ReconnectPolicy::ExponentialBackoff {
            base_delay_ms: 1000,
            max_delay_ms: 5000,
            max_attempts: 0,
            jitter_ms: 0,
        };
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(1000)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(2000)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_millis(4000)));
        assert_eq!(policy.next_delay(4), Some(Duration::from_millis(5000)));
        assert_eq!(policy.next_delay(500), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_exponential_gives_up_after_max_attempts() {
        let policy = ReconnectPolicy::ExponentialBackoff {
            base_delay_ms: 100,
            max_delay_ms: 1000,
            max_attempts: 3,
            jitter_ms: 0,
        };
        assert!(policy.is_bounded());
        assert!(policy.next_delay(3).is_some());
        assert!(policy.next_delay(4).is_none());
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let policy = ReconnectPolicy::ExponentialBackoff {
            base_delay_ms: 100,
            max_delay_ms: 100,
            max_attempts: 0,
            jitter_ms: 50,
        };
        for attempt in 1..20 {
            let delay = policy.next_delay(attempt).unwrap();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay < Duration::from_millis(150));
        }
    }

    #[test]
    fn test_huge_delay_saturates() {
        let policy = ReconnectPolicy::ExponentialBackoff {
            base_delay_ms: u64::MAX,
            max_delay_ms: u64::MAX,
            max_attempts: 0,
            jitter_ms: 1_000,
        };
        for attempt in 1..5 {
            assert_eq!(
                policy.next_delay(attempt),
                Some(Duration::from_millis(u64::MAX))
            );
        }
    }
}
