//! Retry policy for transient failures.

use std::time::Duration;

use rand::Rng;

/// Policy for retrying a candidate after a transient failure.
///
/// Delays grow exponentially from a base, are capped, and carry a small
/// additive jitter so concurrent workers do not retry in lockstep. The
/// jitter is bounded to a quarter of the base so the deterministic part
/// stays strictly increasing until it hits the cap.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retries after the initial send.
    pub max_retries: u32,
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Creates a new policy.
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Total sends an attempt may make: the initial one plus retries.
    pub fn max_sends(&self) -> u32 {
        self.max_retries + 1
    }

    /// Deterministic delay component for the given retry (1-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(retry.saturating_sub(1)));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }

    /// Full backoff delay for the given retry, including jitter.
    pub fn backoff<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let jitter_bound = self.base_delay_ms / 4;
        let jitter = if jitter_bound == 0 {
            0
        } else {
            rng.gen_range(0..=jitter_bound)
        };
        self.delay_for_retry(retry) + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1_000, 5_000)
    }
}

// ============================================================================
// Tests
// ============================================================================
