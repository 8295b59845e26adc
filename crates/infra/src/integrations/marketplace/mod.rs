//! Marketplace order API integration

mod client;
mod fetcher;

pub use client::MarketplaceClient;
pub use fetcher::{FetchOutcome, PaginatedFetcher};
