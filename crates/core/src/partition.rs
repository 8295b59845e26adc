//! Date-range partitioner
//!
//! Splits a sync date range into windows whose result counts stay under the
//! provider's pagination ceiling. Works off a queue of candidate windows,
//! probing each with a count query and bisecting the ones that overflow.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use syncline_domain::{DateRangeWindow, PartitionConfig, Result, SynclineError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Count probe for a candidate window, typically a page-size-1 search that
/// only reads the paging total.
#[async_trait]
pub trait RangeCounter: Send + Sync {
    async fn count(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<u64>;
}

/// Result of partitioning: accepted windows plus non-fatal probe errors.
#[derive(Debug)]
pub struct PartitionOutcome {
    /// Accepted windows, most recent first.
    pub windows: Vec<DateRangeWindow>,
    /// Probe failures that forced a window through unverified.
    pub errors: Vec<String>,
}

pub struct RangePartitioner<'a, C: RangeCounter> {
    counter: &'a C,
    config: &'a PartitionConfig,
}

impl<'a, C: RangeCounter> RangePartitioner<'a, C> {
    pub fn new(counter: &'a C, config: &'a PartitionConfig) -> Self {
        Self { counter, config }
    }

    /// Partition `[from, to]` (inclusive, one-second granularity) into
    /// windows each estimated to hold at most the configured cap.
    ///
    /// Windows that cannot be split further (depth or granularity floor) are
    /// accepted with `overflow = true`. When the probe budget runs out, the
    /// remaining queued windows are accepted unprobed, also flagged as
    /// overflow. A probe failure marks the window overflow and records the
    /// error; only cancellation aborts the whole pass.
    pub async fn partition(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PartitionOutcome> {
        if from > to {
            return Err(SynclineError::InvalidInput(format!(
                "range start {from} is after end {to}"
            )));
        }

        let mut queue: VecDeque<(DateTime<Utc>, DateTime<Utc>, u32)> = VecDeque::new();
        queue.push_back((from, to, 0));

        let mut windows = Vec::new();
        let mut errors = Vec::new();
        let mut probes: u32 = 0;

        while let Some((win_from, win_to, depth)) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(SynclineError::Cancelled);
            }

            if probes >= self.config.max_count_probes {
                warn!(
                    from = %win_from,
                    to = %win_to,
                    "probe budget exhausted, accepting window unverified"
                );
                windows.push(DateRangeWindow {
                    from: win_from,
                    to: win_to,
                    estimated_total: None,
                    split_depth: depth,
                    overflow: true,
                });
                continue;
            }

            if probes > 0 {
                tokio::time::sleep(self.config.probe_gap).await;
            }
            probes += 1;

            let total = match self.counter.count(win_from, win_to).await {
                Ok(total) => total,
                Err(err) => {
                    warn!(from = %win_from, to = %win_to, error = %err, "count probe failed");
                    errors.push(format!("count {win_from}..{win_to}: {err}"));
                    windows.push(DateRangeWindow {
                        from: win_from,
                        to: win_to,
                        estimated_total: None,
                        split_depth: depth,
                        overflow: true,
                    });
                    continue;
                }
            };

            if total == 0 {
                debug!(from = %win_from, to = %win_to, "empty window discarded");
                continue;
            }

            if total <= self.config.max_results_per_window {
                windows.push(DateRangeWindow {
                    from: win_from,
                    to: win_to,
                    estimated_total: Some(total),
                    split_depth: depth,
                    overflow: false,
                });
                continue;
            }

            let duration_secs = (win_to - win_from).num_seconds();
            let splittable = depth < self.config.max_split_depth
                && duration_secs > self.config.min_granularity_secs;
            if !splittable {
                warn!(
                    from = %win_from,
                    to = %win_to,
                    total,
                    depth,
                    "window exceeds cap but cannot split further"
                );
                windows.push(DateRangeWindow {
                    from: win_from,
                    to: win_to,
                    estimated_total: Some(total),
                    split_depth: depth,
                    overflow: true,
                });
                continue;
            }

            let mid = win_from + Duration::seconds(duration_secs / 2);
            queue.push_back((win_from, mid, depth + 1));
            queue.push_back((mid + Duration::seconds(1), win_to, depth + 1));
        }

        // Most recent windows sync first.
        windows.sort_by(|a, b| b.from.cmp(&a.from));

        debug!(
            window_count = windows.len(),
            probe_count = probes,
            error_count = errors.len(),
            "range partitioned"
        );

        Ok(PartitionOutcome { windows, errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Counter that answers from a table of (from, to, total) rows and
    /// records every probe it receives.
    struct TableCounter {
        rows: Vec<(DateTime<Utc>, DateTime<Utc>, Result<u64>)>,
        probed: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    }

    impl TableCounter {
        fn new(rows: Vec<(DateTime<Utc>, DateTime<Utc>, Result<u64>)>) -> Self {
            Self {
                rows,
                probed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RangeCounter for TableCounter {
        async fn count(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<u64> {
            if let Ok(mut probed) = self.probed.lock() {
                probed.push((from, to));
            }
            for (row_from, row_to, total) in &self.rows {
                if *row_from == from && *row_to == to {
                    return total.clone();
                }
            }
            Err(SynclineError::Internal(format!("unexpected probe {from}..{to}")))
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap_or_default()
    }

    fn config() -> PartitionConfig {
        PartitionConfig {
            probe_gap: std::time::Duration::from_millis(0),
            ..PartitionConfig::default()
        }
    }

    #[tokio::test]
    async fn small_range_is_accepted_whole() {
        let counter = TableCounter::new(vec![(ts(0), ts(1000), Ok(500))]);
        let cfg = config();
        let outcome = RangePartitioner::new(&counter, &cfg)
            .partition(ts(0), ts(1000), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.windows.len(), 1);
        assert_eq!(outcome.windows[0].estimated_total, Some(500));
        assert!(!outcome.windows[0].overflow);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn overflowing_range_bisects_and_covers_whole_span() {
        // 0..1000 holds 12_000; halves hold 6_000 each and fit.
        let counter = TableCounter::new(vec![
            (ts(0), ts(1000), Ok(12_000)),
            (ts(0), ts(500), Ok(6_000)),
            (ts(501), ts(1000), Ok(6_000)),
        ]);
        let cfg = config();
        let outcome = RangePartitioner::new(&counter, &cfg)
            .partition(ts(0), ts(1000), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.windows.len(), 2);
        // Most recent first.
        assert_eq!(outcome.windows[0].from, ts(501));
        assert_eq!(outcome.windows[0].to, ts(1000));
        assert_eq!(outcome.windows[1].from, ts(0));
        assert_eq!(outcome.windows[1].to, ts(500));
        // Halves are adjacent without overlap.
        assert_eq!(
            outcome.windows[1].to + Duration::seconds(1),
            outcome.windows[0].from
        );
    }

    #[tokio::test]
    async fn empty_windows_are_discarded() {
        let counter = TableCounter::new(vec![
            (ts(0), ts(1000), Ok(12_000)),
            (ts(0), ts(500), Ok(0)),
            (ts(501), ts(1000), Ok(9_000)),
        ]);
        let cfg = config();
        let outcome = RangePartitioner::new(&counter, &cfg)
            .partition(ts(0), ts(1000), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.windows.len(), 1);
        assert_eq!(outcome.windows[0].from, ts(501));
    }

    #[tokio::test]
    async fn unsplittable_window_is_accepted_with_overflow() {
        // One-second window over the cap cannot split further.
        let counter = TableCounter::new(vec![(ts(0), ts(1), Ok(20_000))]);
        let cfg = config();
        let outcome = RangePartitioner::new(&counter, &cfg)
            .partition(ts(0), ts(1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.windows.len(), 1);
        assert!(outcome.windows[0].overflow);
        assert_eq!(outcome.windows[0].estimated_total, Some(20_000));
    }

    #[tokio::test]
    async fn probe_failure_accepts_window_and_records_error() {
        let counter = TableCounter::new(vec![(
            ts(0),
            ts(1000),
            Err(SynclineError::Network("connect timeout".into())),
        )]);
        let cfg = config();
        let outcome = RangePartitioner::new(&counter, &cfg)
            .partition(ts(0), ts(1000), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.windows.len(), 1);
        assert!(outcome.windows[0].overflow);
        assert_eq!(outcome.windows[0].estimated_total, None);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_pass() {
        let counter = TableCounter::new(vec![]);
        let cfg = config();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = RangePartitioner::new(&counter, &cfg)
            .partition(ts(0), ts(1000), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SynclineError::Cancelled));
        assert!(counter.probed.lock().map(|p| p.is_empty()).unwrap_or(false));
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let counter = TableCounter::new(vec![]);
        let cfg = config();
        let err = RangePartitioner::new(&counter, &cfg)
            .partition(ts(10), ts(0), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SynclineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn probe_budget_exhaustion_accepts_remainder_unverified() {
        let counter = TableCounter::new(vec![
            (ts(0), ts(1000), Ok(12_000)),
            (ts(0), ts(500), Ok(6_000)),
        ]);
        let cfg = PartitionConfig {
            max_count_probes: 2,
            probe_gap: std::time::Duration::from_millis(0),
            ..PartitionConfig::default()
        };
        let outcome = RangePartitioner::new(&counter, &cfg)
            .partition(ts(0), ts(1000), &CancellationToken::new())
            .await
            .unwrap();
        // Left half probed and accepted, right half forced through.
        assert_eq!(outcome.windows.len(), 2);
        let unverified = outcome
            .windows
            .iter()
            .find(|w| w.from == ts(501))
            .expect("right half present");
        assert!(unverified.overflow);
        assert_eq!(unverified.estimated_total, None);
    }
}
