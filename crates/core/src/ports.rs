//! Port interfaces for the engine's external collaborators
//!
//! The persistence store, provider APIs, token endpoints and the progress
//! channel are all out of scope; the engine reaches them only through these
//! traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use syncline_domain::{
    DerivedFreight, EntryKind, ExternalAccount, LedgerCategory, LedgerEntry, LedgerPaymentMethod,
    MarketplaceOrder, OrderPage, OrderShipment, Provider, RefreshedToken, Result, SyncEvent,
};
use uuid::Uuid;

/// Category as persisted by the store collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCategory {
    /// Local identifier referenced by synced entries.
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
}

/// Payment method as persisted by the store collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPaymentMethod {
    /// Local identifier referenced by synced entries.
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
}

/// Persistence collaborator.
///
/// Every upsert is atomic and idempotent, keyed by `(user_id, external_id)`:
/// re-syncing the same external record updates mutable fields in place and
/// never creates a duplicate. The engine relies on that atomicity for its
/// final write instead of doing read-then-write itself.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Upsert a marketplace order together with its derived freight figures.
    async fn upsert_order(
        &self,
        user_id: Uuid,
        order: &MarketplaceOrder,
        freight: Option<&DerivedFreight>,
    ) -> Result<()>;

    /// Upsert a ledger entry. `category_id` and `payment_method_id` are the
    /// local references, `None` when resolution failed (eligible for
    /// backfill on a later sync).
    async fn upsert_entry(
        &self,
        user_id: Uuid,
        entry: &LedgerEntry,
        category_id: Option<Uuid>,
        payment_method_id: Option<Uuid>,
    ) -> Result<()>;

    /// Upsert a category and return its stored form (with the local id).
    async fn upsert_category(
        &self,
        user_id: Uuid,
        category: &LedgerCategory,
    ) -> Result<StoredCategory>;

    /// All categories persisted for a user, for cache prefetch.
    async fn categories_for_user(&self, user_id: Uuid) -> Result<Vec<StoredCategory>>;

    /// Upsert a payment method and return its stored form.
    async fn upsert_payment_method(
        &self,
        user_id: Uuid,
        payment_method: &LedgerPaymentMethod,
    ) -> Result<StoredPaymentMethod>;

    /// All payment methods persisted for a user, for cache prefetch.
    async fn payment_methods_for_user(&self, user_id: Uuid) -> Result<Vec<StoredPaymentMethod>>;
}

/// Account credential store.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Accounts for a provider, or all accounts when `provider` is `None`.
    /// Quarantined accounts are included.
    async fn list_accounts(&self, provider: Option<Provider>) -> Result<Vec<ExternalAccount>>;

    async fn get_account(&self, id: Uuid) -> Result<ExternalAccount>;

    /// Persist the four token fields atomically after a successful refresh.
    async fn update_tokens(
        &self,
        id: Uuid,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn set_quarantine(&self, id: Uuid, until: DateTime<Utc>) -> Result<()>;

    async fn clear_quarantine(&self, id: Uuid) -> Result<()>;
}

/// Marketplace order API. Auth via bearer access token.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Count probe: page size 1 search that only reads the paging total.
    async fn count_orders(
        &self,
        access_token: &str,
        seller_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64>;

    async fn search_orders(
        &self,
        access_token: &str,
        seller_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u64,
        offset: u64,
    ) -> Result<OrderPage>;

    async fn order_detail(&self, access_token: &str, order_id: &str) -> Result<MarketplaceOrder>;

    async fn shipment_detail(
        &self,
        access_token: &str,
        shipment_id: &str,
    ) -> Result<OrderShipment>;
}

/// Accounting platform API. Rate limits aggressively (429).
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn list_entries(
        &self,
        access_token: &str,
        kind: EntryKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>>;

    async fn entry_detail(
        &self,
        access_token: &str,
        kind: EntryKind,
        entry_id: &str,
    ) -> Result<LedgerEntry>;

    async fn list_categories(&self, access_token: &str) -> Result<Vec<LedgerCategory>>;

    async fn category_detail(
        &self,
        access_token: &str,
        category_id: &str,
    ) -> Result<LedgerCategory>;

    async fn list_payment_methods(&self, access_token: &str) -> Result<Vec<LedgerPaymentMethod>>;

    async fn payment_method_detail(
        &self,
        access_token: &str,
        payment_method_id: &str,
    ) -> Result<LedgerPaymentMethod>;
}

/// Provider token endpoint: `POST grant_type=refresh_token`.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken>;
}

/// Progress event channel. The transport (push channel, websocket, log) is a
/// collaborator; emitting must never fail the sync.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, event: SyncEvent);
}
