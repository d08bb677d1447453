//! Exponential backoff with jitter for reconnection attempts.
//!
//! Reconnection storms are the failure mode this guards against: when the
//! broker comes back, every disconnected process must not hammer it at the
//! same instant. Delays grow exponentially from a base, are capped at a
//! maximum, and each concrete sleep is drawn uniformly from
//! `0..=capped delay` (full jitter).
//!
//! # Example
//!
//! ```
//! use meridian_broker::backoff::BackoffPolicy;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::builder()
//!     .max_attempts(6)
//!     .base_delay(Duration::from_millis(250))
//!     .max_delay(Duration::from_secs(30))
//!     .build();
//!
//! assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(250));
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
//! ```

use rand::Rng;
use std::time::Duration;

/// Backoff configuration for reconnection attempts.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `base_delay`: 250ms
/// - `max_delay`: 30 seconds
/// - `multiplier`: 2.0
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Maximum number of attempts before giving up.
    pub max_attempts: usize,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap for the exponential growth.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub fn builder() -> BackoffPolicyBuilder {
        BackoffPolicyBuilder::default()
    }

    /// Deterministic delay for a given attempt number (0-based), before
    /// jitter: `base_delay * multiplier^attempt`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.base_delay.min(self.max_delay);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        #[allow(clippy::cast_precision_loss)]
        let delay_ms =
            (self.base_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32)) as u64;

        Duration::from_millis(delay_ms).min(self.max_delay)
    }

    /// Concrete sleep for a given attempt: uniformly random in
    /// `0..=delay_for_attempt(attempt)` (full jitter).
    #[must_use]
    pub fn jittered_delay_for_attempt(&self, attempt: usize) -> Duration {
        let cap = self.delay_for_attempt(attempt);
        if cap.is_zero() {
            return cap;
        }
        let millis = rand::thread_rng().gen_range(0..=cap.as_millis());
        #[allow(clippy::cast_possible_truncation)]
        Duration::from_millis(millis as u64)
    }
}

/// Builder for [`BackoffPolicy`].
#[derive(Debug, Clone, Default)]
pub struct BackoffPolicyBuilder {
    max_attempts: Option<usize>,
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl BackoffPolicyBuilder {
    /// Set the maximum number of attempts.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Set the cap for exponential growth.
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the growth factor per attempt.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the [`BackoffPolicy`].
    #[must_use]
    pub fn build(self) -> BackoffPolicy {
        let defaults = BackoffPolicy::default();
        BackoffPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay: self.base_delay.unwrap_or(defaults.base_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially() {
        let policy = BackoffPolicy::builder()
            .base_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(10))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let policy = BackoffPolicy::builder()
            .base_delay(Duration::from_secs(1))
            .multiplier(10.0)
            .max_delay(Duration::from_secs(2))
            .build();

        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(2));
    }

    #[test]
    fn jitter_never_exceeds_cap() {
        let policy = BackoffPolicy::builder()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(400))
            .build();

        for attempt in 0..8 {
            let cap = policy.delay_for_attempt(attempt);
            for _ in 0..32 {
                assert!(policy.jittered_delay_for_attempt(attempt) <= cap);
            }
        }
    }
}
