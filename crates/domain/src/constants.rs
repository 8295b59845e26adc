//! Domain constants
//!
//! Observed provider limits and engine defaults. Tunable values are surfaced
//! through [`crate::config::EngineConfig`]; these are the defaults.

/// Provider cap on results a single date window may hold before it must be
/// split.
pub const MAX_RESULTS_PER_WINDOW: u64 = 9_500;

/// Provider's hard pagination ceiling; offsets at or past this value are
/// rejected upstream.
pub const MAX_PAGE_OFFSET: u64 = 10_000;

/// Practical page size for marketplace order searches.
pub const ORDER_PAGE_SIZE: u64 = 50;

/// Maximum recursive bisections of a date window.
pub const MAX_SPLIT_DEPTH: u32 = 16;

/// Smallest splittable window, in seconds.
pub const MIN_WINDOW_GRANULARITY_SECS: i64 = 1;

/// Tokens within this many hours of expiry are due for refresh.
pub const REFRESH_THRESHOLD_HOURS: i64 = 24;

/// Safety margin subtracted from the provider-reported `expires_in`.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

/// Floor for a refreshed token's lifetime after the safety margin.
pub const MIN_TOKEN_LIFETIME_SECS: i64 = 30;

/// Consecutive invalid-grant failures before a marketplace account is
/// quarantined.
pub const QUARANTINE_FAILURE_THRESHOLD: u32 = 5;

/// Rolling window for the consecutive-failure counter, in seconds.
pub const FAILURE_WINDOW_SECS: i64 = 3_600;

/// How long a quarantined account skips passive refresh, in hours.
pub const QUARANTINE_DURATION_HOURS: i64 = 24;

/// Total attempts the smart refresh strategy makes.
pub const SMART_REFRESH_MAX_ATTEMPTS: u32 = 7;

/// Attempts that use passive refresh before escalating to forced refresh.
pub const SMART_REFRESH_PASSIVE_ATTEMPTS: u32 = 2;

/// Unit-price tier below which most logistic types charge no freight
/// adjustment.
pub const FREIGHT_PRICE_TIER: f64 = 79.0;

/// Flat self-service charge below the price tier when base and list cost
/// cancel out.
pub const FLEX_CHARGE_BELOW_TIER: f64 = 15.90;

/// Flat self-service charge at or above the price tier when base and list
/// cost cancel out.
pub const FLEX_CHARGE_ABOVE_TIER: f64 = 1.59;
