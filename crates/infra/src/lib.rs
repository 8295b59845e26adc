//! # Syncline Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - HTTP client with retry semantics
//! - Provider token endpoints and the token lifecycle manager
//! - Marketplace and ledger API integrations
//! - The sync orchestrator and session plumbing
//!
//! ## Architecture
//! - Implements traits defined in `syncline-core`
//! - Depends on `syncline-domain` and `syncline-core`
//! - Contains all "impure" code (network I/O, clocks, environment)

pub mod auth;
pub mod backoff;
pub mod config;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod sync;
pub mod throttle;

pub use auth::{LedgerTokenClient, MarketplaceTokenClient, TokenLifecycleManager};
pub use backoff::Backoff;
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::ledger::{LedgerClient, ReferenceResolver};
pub use integrations::marketplace::{MarketplaceClient, PaginatedFetcher};
pub use sync::{SyncOrchestrator, SyncSession};
pub use throttle::ThrottledResolver;
