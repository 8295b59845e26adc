//! Rolling failure counter backing token quarantine decisions

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use syncline_domain::AccountId;

#[derive(Debug, Clone, Copy)]
struct FailureWindow {
    count: u32,
    last_failure_at: DateTime<Utc>,
}

/// Counts consecutive invalid-grant refresh failures per account within a
/// rolling window. A success or quarantine expiry clears the slate.
#[derive(Debug, Default)]
pub struct FailureTracker {
    windows: DashMap<AccountId, FailureWindow>,
    window_secs: i64,
}

impl FailureTracker {
    pub fn new(window_secs: i64) -> Self {
        Self {
            windows: DashMap::new(),
            window_secs,
        }
    }

    /// Record a failure and return the resulting consecutive count. Failures
    /// older than the rolling window restart the count at one.
    pub fn record_failure(&self, account_id: AccountId) -> u32 {
        self.record_failure_at(account_id, Utc::now())
    }

    fn record_failure_at(&self, account_id: AccountId, now: DateTime<Utc>) -> u32 {
        let mut entry = self.windows.entry(account_id).or_insert(FailureWindow {
            count: 0,
            last_failure_at: now,
        });
        let stale = now - entry.last_failure_at > Duration::seconds(self.window_secs);
        if stale {
            entry.count = 1;
        } else {
            entry.count += 1;
        }
        entry.last_failure_at = now;
        entry.count
    }

    pub fn clear(&self, account_id: AccountId) {
        self.windows.remove(&account_id);
    }

    pub fn count(&self, account_id: AccountId) -> u32 {
        self.windows.get(&account_id).map(|w| w.count).unwrap_or(0)
    }
}
