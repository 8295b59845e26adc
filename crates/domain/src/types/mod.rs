//! Common data types used throughout the sync engine

pub mod account;
pub mod freight;
pub mod ledger;
pub mod order;
pub mod sync;
pub mod window;

pub use account::{AccountId, ExternalAccount, Provider, RefreshedToken, TokenState};
pub use freight::{AdjustmentRule, ChargedCostSource, DerivedFreight, FreightInput, LogisticType};
pub use ledger::{EntryKind, LedgerCategory, LedgerEntry, LedgerPaymentMethod};
pub use order::{MarketplaceOrder, OrderPage, OrderShipment, ShippingOption};
pub use sync::{RefreshReport, SyncEvent, SyncPhase, SyncSummary};
pub use window::DateRangeWindow;
