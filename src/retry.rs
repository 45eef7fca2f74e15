//! Bounded retry with exponential backoff for external service calls.
//!
//! The policy is a plain value object injected into every service-calling
//! component, so tests can substitute [`RetryPolicy::zero_delay`] and run
//! without wall-clock waits.

use std::future::Future;
use std::time::Duration;

use crate::types::ExtractError;

/// Maximum attempts plus an exponential backoff schedule.
///
/// The default mirrors the usual client policy for remote generative and
/// embedding services: 3 attempts, waits doubling from 4 seconds and capped
/// at 10.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Policy with no waiting between attempts, for tests.
    pub fn zero_delay(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before retrying after the given 1-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        (self.base_delay * factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted.
    ///
    /// The closure receives the 1-based attempt number. The final error is
    /// returned unchanged so callers keep their own taxonomy.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ExtractError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ExtractError>>,
    {
        let mut last_err = None;
        for attempt in 1..=self.max_attempts {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::debug!(attempt, max = self.max_attempts, error = %err, "attempt failed");
                    last_err = Some(err);
                    if attempt < self.max_attempts {
                        let delay = self.delay_for(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            ExtractError::InvalidInput("retry policy ran zero attempts".to_string())
        }))
    }
}
