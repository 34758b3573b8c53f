//! Discovery retry policy
//!
//! Controls how long the negotiation loop sleeps between discovery attempts
//! when no counterpart is available or a handshake fails.

use std::time::Duration;

/// Exponential backoff policy for discovery retries
///
/// Unlike a bounded reconnect policy, discovery retries indefinitely: the
/// session stays in the discovering state until a counterpart appears or the
/// session is stopped. A successful cycle resets the attempt counter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Initial backoff delay in milliseconds (default: 1000ms)
    pub backoff_initial_ms: u64,
    /// Maximum backoff delay in milliseconds (default: 30000ms)
    pub backoff_max_ms: u64,
    /// Backoff multiplier (default: 2.0)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to backoff (default: true)
    pub jitter_enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_initial_ms: 1000,
            backoff_max_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_enabled: true,
        }
    }
}

impl RetryPolicy {
    /// Calculate backoff duration for a given attempt number (0-indexed)
    ///
    /// Uses exponential backoff clamped to the maximum, with optional
    /// jitter of up to 25% of the base delay.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let backoff_ms =
            (self.backoff_initial_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        let backoff_ms = backoff_ms.min(self.backoff_max_ms as f64);

        let final_ms = if self.jitter_enabled {
            backoff_ms + rand_jitter(backoff_ms * 0.25)
        } else {
            backoff_ms
        };

        Duration::from_millis(final_ms as u64)
    }
}

/// Simple pseudo-random jitter using time-based seed
fn rand_jitter(max: f64) -> f64 {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as f64;
    (seed % 1000.0) / 1000.0 * max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth() {
        let policy = RetryPolicy {
            jitter_enabled: false,
            ..Default::default()
        };

        assert_eq!(policy.backoff_for(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_max_clamp() {
        let policy = RetryPolicy {
            jitter_enabled: false,
            backoff_max_ms: 5000,
            ..Default::default()
        };

        assert_eq!(policy.backoff_for(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();

        let delay = policy.backoff_for(0);
        assert!(delay >= Duration::from_millis(1000));
        assert!(delay <= Duration::from_millis(1250));
    }
}
