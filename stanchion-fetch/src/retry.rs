//! Retry policy with capped exponential backoff.

use std::time::Duration;

// ============================================================================
// Backoff
// ============================================================================

/// Capped exponential backoff.
///
/// The delay before retry `attempt` (0-based) is
/// `min(base * multiplier^attempt, cap)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub base: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub cap: Duration,
}

impl Backoff {
    /// Creates a new backoff.
    pub fn new(base: Duration, multiplier: f64, cap: Duration) -> Self {
        Self {
            base,
            multiplier,
            cap,
        }
    }

    /// A backoff that never waits.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, 1.0, Duration::ZERO)
    }

    /// Calculates the delay for a given attempt number.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = self.base.as_nanos() as f64 * self.multiplier.powi(exponent);
        let cap = self.cap.as_nanos() as f64;

        if !nanos.is_finite() || nanos >= cap {
            return self.cap;
        }

        Duration::from_nanos(nanos.max(0.0).round() as u64)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(8))
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Delay schedule between attempts.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Creates a policy with the default backoff.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::default(),
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::none(),
        }
    }

    /// Sets the backoff.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total attempts allowed, including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculates the delay after a failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::new(Duration::from_millis(100), 2.0, Duration::from_secs(1));

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
    }

    #[test]
    fn test_max_delay_cap() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(10), Duration::from_secs(8));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(8));
    }

    #[test]
    fn test_fractional_multiplier() {
        let backoff = Backoff::new(Duration::from_millis(1000), 1.5, Duration::from_secs(60));
        assert_eq!(backoff.delay(2), Duration::from_millis(2250));
    }

    #[test]
    fn test_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.attempts(), 1);
        assert_eq!(policy.delay_for_attempt(3), Duration::ZERO);
    }
}
