//! Retry policies.
//!
//! - `RetryConfig`: optimistic commits that lose a race. Backoff grows
//!   linearly with the attempt number, scaled by a random jitter so that
//!   contending writers spread out.
//! - `connection_backoff`: exponential backoff (via `backon`) for reaching
//!   the backing store at startup.

use std::time::Duration;

use backon::ExponentialBuilder;
use rand::Rng;
use serde::Deserialize;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Upper bound (inclusive) of the per-attempt random factor, in milliseconds.
    /// Set to 0 to retry without sleeping.
    pub jitter_ms: u64,
    /// Maximum number of attempts before giving up (0 = retry forever).
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            jitter_ms: 10,
            max_attempts: 100,
        }
    }
}

impl RetryConfig {
    /// Retry forever, as long as the race keeps being lost.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before retrying after `attempt` failed attempts.
    ///
    /// delay = attempt * rand(1..=jitter_ms) milliseconds.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        let factor = rand::rng().random_range(1..=self.jitter_ms);
        Duration::from_millis(u64::from(attempt).saturating_mul(factor))
    }

    /// Check if another attempt should be made after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt < self.max_attempts
    }
}

/// Backoff for backing store connection retries at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}
