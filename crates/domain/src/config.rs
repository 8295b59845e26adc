//! Engine configuration
//!
//! Plain structs with defaults carrying the observed provider limits. Every
//! cap that bounds API traffic (split depth, probe count, concurrency) is a
//! field here rather than a constant buried in the code that uses it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub token: TokenConfig,
    pub partition: PartitionConfig,
    pub paging: PagingConfig,
    pub throttle: ThrottleConfig,
}

/// Token lifecycle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Tokens expiring within this window count as `NeedsRefresh`.
    pub refresh_threshold_hours: i64,
    /// Consecutive invalid-grant failures before quarantine.
    pub quarantine_failure_threshold: u32,
    /// Rolling window for the failure counter.
    pub failure_window_secs: i64,
    /// How long quarantine lasts before a recovery sweep may clear it.
    pub quarantine_duration_hours: i64,
    /// Total smart-refresh attempts.
    pub smart_refresh_max_attempts: u32,
    /// Leading attempts that stay passive before forcing refresh.
    pub smart_refresh_passive_attempts: u32,
    /// Extra settle delay before the final smart-refresh attempts.
    #[serde(with = "duration_millis")]
    pub smart_refresh_settle_delay: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_threshold_hours: constants::REFRESH_THRESHOLD_HOURS,
            quarantine_failure_threshold: constants::QUARANTINE_FAILURE_THRESHOLD,
            failure_window_secs: constants::FAILURE_WINDOW_SECS,
            quarantine_duration_hours: constants::QUARANTINE_DURATION_HOURS,
            smart_refresh_max_attempts: constants::SMART_REFRESH_MAX_ATTEMPTS,
            smart_refresh_passive_attempts: constants::SMART_REFRESH_PASSIVE_ATTEMPTS,
            smart_refresh_settle_delay: Duration::from_secs(2),
        }
    }
}

/// Date-range partitioner tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Per-window result cap above which a window must be split.
    pub max_results_per_window: u64,
    /// Maximum recursive bisections of one window.
    pub max_split_depth: u32,
    /// Smallest splittable window.
    pub min_granularity_secs: i64,
    /// Upper bound on count probes for one partitioning run.
    pub max_count_probes: u32,
    /// Gap between serial count probes.
    #[serde(with = "duration_millis")]
    pub probe_gap: Duration,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_results_per_window: constants::MAX_RESULTS_PER_WINDOW,
            max_split_depth: constants::MAX_SPLIT_DEPTH,
            min_granularity_secs: constants::MIN_WINDOW_GRANULARITY_SECS,
            max_count_probes: 256,
            probe_gap: Duration::from_millis(100),
        }
    }
}

/// Offset-pagination tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Records per page.
    pub page_size: u64,
    /// Provider's hard offset ceiling.
    pub max_offset: u64,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self { page_size: constants::ORDER_PAGE_SIZE, max_offset: constants::MAX_PAGE_OFFSET }
    }
}

/// Throttled detail-resolver tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Concurrent detail calls in flight.
    pub max_in_flight: usize,
    /// Enforced gap after each call before its slot is reusable.
    #[serde(with = "duration_millis")]
    pub call_gap: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { max_in_flight: 4, call_gap: Duration::from_millis(200) }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
