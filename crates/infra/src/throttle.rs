//! Concurrency-throttled detail resolution
//!
//! Fans out per-item detail calls under a semaphore while pacing requests
//! with a fixed gap held through the permit, so the provider sees at most
//! `max_in_flight` concurrent calls and a bounded request rate.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use syncline_domain::{Result, SynclineError, ThrottleConfig};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct ThrottledResolver {
    semaphore: Arc<Semaphore>,
    config: ThrottleConfig,
}

impl ThrottledResolver {
    pub fn new(config: ThrottleConfig) -> Self {
        // Clamp to the range the providers tolerate.
        let permits = config.max_in_flight.clamp(2, 8);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            config,
        }
    }

    /// Resolve every item through `op`, preserving input order in the output.
    /// Each item yields its own `Result`; a failure never aborts its
    /// siblings. Cancellation short-circuits items not yet started.
    pub async fn resolve_all<I, T, F, Fut>(
        &self,
        items: Vec<I>,
        cancel: &CancellationToken,
        op: F,
    ) -> Vec<Result<T>>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total = items.len();
        debug!(total, "resolving details under throttle");

        let futures = items.into_iter().map(|item| {
            let semaphore = Arc::clone(&self.semaphore);
            let gap = self.config.call_gap;
            let op = &op;
            async move {
                if cancel.is_cancelled() {
                    return Err(SynclineError::Cancelled);
                }

                let permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| SynclineError::Internal("throttle semaphore closed".into()))?;

                if cancel.is_cancelled() {
                    return Err(SynclineError::Cancelled);
                }

                let result = op(item).await;

                // The gap is paced while still holding the permit.
                if !gap.is_zero() {
                    tokio::time::sleep(gap).await;
                }
                drop(permit);

                result
            }
        });

        join_all(futures).await
    }
}
