//! Date-range windows produced by the range partitioner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sub-range of the requested sync interval, inclusive at both ends and
/// aligned to 1-second granularity.
///
/// A window is "safe" when its provider-reported total fits under the
/// per-window cap, or when it was accepted anyway because it cannot be split
/// further (`overflow` set), a lossy-risk case that is logged and never
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Provider-reported count for this exact window; `None` when the window
    /// was accepted without a successful count probe.
    pub estimated_total: Option<u64>,
    pub split_depth: u32,
    /// True when the window exceeds the cap but was accepted because depth or
    /// granularity limits were reached.
    pub overflow: bool,
}

impl DateRangeWindow {
    pub fn duration_secs(&self) -> i64 {
        (self.to - self.from).num_seconds()
    }
}
