//! Retry policy for source fetches.
//!
//! [`RetryPolicy::decide`] is the whole policy: given the failure class and
//! how many attempts have been made, it says whether to try again and how
//! long to wait. [`retry_with_policy`] just drives an async operation with it.
//!
//! Only [`FailureKind::Transient`] failures are retried. HTTP status
//! rejections, malformed documents, and configuration problems are terminal
//! on the first occurrence.

use std::future::Future;
use std::time::Duration;

use eventsweep_core::FailureKind;

use crate::error::ScraperError;

/// Upper bound on a single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// Classification-aware exponential backoff.
///
/// With the default base of 1s the waits are 1s, 2s, 4s, ... between
/// consecutive attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    max_attempts: u32,
    base_delay: Duration,
    /// Spread each sleep by ±25% to avoid synchronized retries.
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter: false,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the attempt following attempt number `attempt` (1-based):
    /// `base * 2^(attempt - 1)`, capped at 60s.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(MAX_DELAY)
    }

    /// Decides what to do after attempt number `attempt` (1-based) failed
    /// with a failure of class `kind`.
    #[must_use]
    pub fn decide(&self, kind: FailureKind, attempt: u32) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.delay_after(attempt),
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        delay.mul_f64(rand::random::<f64>() * 0.5 + 0.75)
    }
}

/// Runs `operation` until it succeeds or `policy` gives up, returning the
/// last error in the latter case.
pub(crate) async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    source_key: &str,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match policy.decide(err.kind(), attempt) {
            RetryDecision::GiveUp => return Err(err),
            RetryDecision::Retry { delay } => {
                let delay = policy.jittered(delay);
                tracing::warn!(
                    source = source_key,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient fetch error, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
