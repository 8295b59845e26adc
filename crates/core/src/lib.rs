//! # Syncline Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the external collaborators
//! - The freight adjustment policy table
//! - Date-range partitioning
//! - Failure counting and text normalization helpers
//!
//! ## Architecture Principles
//! - Only depends on `syncline-domain`
//! - No database or HTTP code
//! - All external dependencies via traits

pub mod failure;
pub mod freight;
pub mod partition;
pub mod ports;
pub mod text;

// Re-export specific items to avoid ambiguity
pub use failure::FailureTracker;
pub use freight::derive_freight;
pub use partition::{PartitionOutcome, RangeCounter, RangePartitioner};
pub use ports::{
    AccountRepository, LedgerApi, MarketplaceApi, ProgressSink, RecordStore, StoredCategory,
    StoredPaymentMethod, TokenEndpoint,
};
pub use text::normalize_name;
