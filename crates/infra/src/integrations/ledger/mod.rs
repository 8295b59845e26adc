//! Accounting-platform (ledger) API integration

mod client;
mod references;

pub use client::LedgerClient;
pub use references::{ReferenceResolver, ReferenceResolverConfig};
