//! External provider integrations

pub mod ledger;
pub mod marketplace;
