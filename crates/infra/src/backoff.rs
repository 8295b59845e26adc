//! Bounded exponential backoff executor
//!
//! Wraps an async operation in a retry loop. The executor has no opinion on
//! which errors deserve a retry; callers that want to bail out early pass a
//! predicate to [`Backoff::execute_if`] ([`is_recoverable`] covers the usual
//! transport taxonomy). Delay grows exponentially from the base, is capped at
//! the maximum, and carries up to 10% random jitter. No delay is taken after
//! the final attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use syncline_domain::{Result, SynclineError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Run `op` until it succeeds or attempts run out, retrying every error.
    /// The last error is returned when attempts are exhausted.
    pub async fn execute<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_if(label, |_| true, op).await
    }

    /// Run `op` until it succeeds, `retry` declines the error, or attempts
    /// run out. The last error is returned when attempts are exhausted.
    pub async fn execute_if<T, P, F, Fut>(&self, label: &str, mut retry: P, mut op: F) -> Result<T>
    where
        P: FnMut(&SynclineError) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_err = None;

        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label, attempt, "operation recovered after retry");
                    }
                    return Ok(value);
                }
                Err(err) if retry(&err) && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "recoverable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            SynclineError::Internal(format!("{label}: retries exhausted without an error"))
        }))
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let multiplier = 1u32 << shift;
        let capped = self.base_delay.saturating_mul(multiplier).min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.0..=0.1);
        capped.mul_f64(1.0 + jitter)
    }
}

/// Advisory retry predicate for [`Backoff::execute_if`].
///
/// Recoverable: transport failures, throttling, and transient server errors.
/// Auth, invalid-grant, malformed payloads and other client errors are not.
pub fn is_recoverable(err: &SynclineError) -> bool {
    match err {
        SynclineError::Network(_) | SynclineError::RateLimited(_) => true,
        SynclineError::Provider { status, .. } => {
            matches!(status, 429 | 500 | 502 | 503 | 504)
        }
        _ => false,
    }
}
