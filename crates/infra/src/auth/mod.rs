//! Token endpoints and the token lifecycle manager

mod lifecycle;
mod token_client;

pub use lifecycle::TokenLifecycleManager;
pub use token_client::{LedgerTokenClient, MarketplaceTokenClient};
