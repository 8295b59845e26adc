//! Category and payment-method resolution with memoization
//!
//! Ledger entries reference categories and payment methods by the
//! provider's external id; stored records reference them by local id.
//! Resolution runs in three tiers: stored external-id lookup,
//! normalized-name match against stored records, then persist the
//! provider's record on first sighting. Every hit is memoized so a sync
//! touches the store and the API once per distinct reference.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use syncline_core::{normalize_name, LedgerApi, RecordStore};
use syncline_domain::{LedgerCategory, LedgerPaymentMethod, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReferenceResolverConfig {
    pub max_capacity: u64,
    pub time_to_live: Duration,
}

impl Default for ReferenceResolverConfig {
    fn default() -> Self {
        Self {
            max_capacity: 2_000,
            time_to_live: Duration::from_secs(15 * 60),
        }
    }
}

pub struct ReferenceResolver {
    api: Arc<dyn LedgerApi>,
    store: Arc<dyn RecordStore>,
    category_memo: Cache<String, Uuid>,
    payment_method_memo: Cache<String, Uuid>,
    remote_categories: Cache<String, String>,
    remote_payment_methods: Cache<String, String>,
}

impl ReferenceResolver {
    pub fn new(
        api: Arc<dyn LedgerApi>,
        store: Arc<dyn RecordStore>,
        config: ReferenceResolverConfig,
    ) -> Self {
        fn cache<V: Clone + Send + Sync + 'static>(
            config: &ReferenceResolverConfig,
        ) -> Cache<String, V> {
            Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(config.time_to_live)
                .build()
        }
        Self {
            api,
            store,
            category_memo: cache(&config),
            payment_method_memo: cache(&config),
            remote_categories: cache(&config),
            remote_payment_methods: cache(&config),
        }
    }

    /// Warm the memos from stored records and the remote name caches from
    /// the provider's listings. A listing failure degrades to per-entry
    /// detail lookups instead of failing the sync.
    pub async fn prefetch(&self, user_id: Uuid, access_token: &str) -> Result<()> {
        let stored_categories = self.store.categories_for_user(user_id).await?;
        for category in &stored_categories {
            let key = format!("{user_id}:{}", category.external_id);
            self.category_memo.insert(key, category.id).await;
        }
        let stored_methods = self.store.payment_methods_for_user(user_id).await?;
        for method in &stored_methods {
            let key = format!("{user_id}:{}", method.external_id);
            self.payment_method_memo.insert(key, method.id).await;
        }

        match self.api.list_categories(access_token).await {
            Ok(remote) => {
                for category in &remote {
                    let key = format!("{user_id}:{}", category.external_id);
                    self.remote_categories.insert(key, category.name.clone()).await;
                }
            }
            Err(err) => warn!(error = %err, "category listing failed, falling back to detail lookups"),
        }
        match self.api.list_payment_methods(access_token).await {
            Ok(remote) => {
                for method in &remote {
                    let key = format!("{user_id}:{}", method.external_id);
                    self.remote_payment_methods.insert(key, method.name.clone()).await;
                }
            }
            Err(err) => warn!(error = %err, "payment-method listing failed, falling back to detail lookups"),
        }

        debug!(
            categories = stored_categories.len(),
            payment_methods = stored_methods.len(),
            "reference memos prefetched"
        );
        Ok(())
    }

    /// Resolve a category external id to the local category id.
    ///
    /// Resolution failure is reported to the caller as an error; whether a
    /// record may persist without its category is the caller's call.
    pub async fn resolve_category(
        &self,
        user_id: Uuid,
        access_token: &str,
        category_external_id: &str,
    ) -> Result<Uuid> {
        let memo_key = format!("{user_id}:{category_external_id}");
        if let Some(id) = self.category_memo.get(&memo_key).await {
            return Ok(id);
        }

        let stored = self.store.categories_for_user(user_id).await?;

        // Tier 1: already mapped by external id.
        if let Some(found) = stored.iter().find(|c| c.external_id == category_external_id) {
            self.category_memo.insert(memo_key, found.id).await;
            return Ok(found.id);
        }

        let remote_name = match self.remote_categories.get(&memo_key).await {
            Some(name) => name,
            None => {
                let remote = self.api.category_detail(access_token, category_external_id).await?;
                self.remote_categories.insert(memo_key.clone(), remote.name.clone()).await;
                remote.name
            }
        };

        // Tier 2: the provider's name matches a stored category that was
        // created under a different external id.
        let wanted = normalize_name(&remote_name);
        if let Some(found) = stored.iter().find(|c| normalize_name(&c.name) == wanted) {
            debug!(
                category = %remote_name,
                external_id = category_external_id,
                "category matched by normalized name"
            );
            self.category_memo.insert(memo_key, found.id).await;
            return Ok(found.id);
        }

        // Tier 3: first sighting, persist it.
        let created = self
            .store
            .upsert_category(
                user_id,
                &LedgerCategory {
                    external_id: category_external_id.to_string(),
                    name: remote_name.clone(),
                },
            )
            .await?;
        info!(category = %remote_name, external_id = category_external_id, "category created");
        self.category_memo.insert(memo_key, created.id).await;
        Ok(created.id)
    }

    /// Resolve a payment-method external id to the local id, with the same
    /// tiers as category resolution.
    pub async fn resolve_payment_method(
        &self,
        user_id: Uuid,
        access_token: &str,
        payment_method_external_id: &str,
    ) -> Result<Uuid> {
        let memo_key = format!("{user_id}:{payment_method_external_id}");
        if let Some(id) = self.payment_method_memo.get(&memo_key).await {
            return Ok(id);
        }

        let stored = self.store.payment_methods_for_user(user_id).await?;

        if let Some(found) = stored.iter().find(|m| m.external_id == payment_method_external_id) {
            self.payment_method_memo.insert(memo_key, found.id).await;
            return Ok(found.id);
        }

        let remote_name = match self.remote_payment_methods.get(&memo_key).await {
            Some(name) => name,
            None => {
                let remote = self
                    .api
                    .payment_method_detail(access_token, payment_method_external_id)
                    .await?;
                self.remote_payment_methods.insert(memo_key.clone(), remote.name.clone()).await;
                remote.name
            }
        };

        let wanted = normalize_name(&remote_name);
        if let Some(found) = stored.iter().find(|m| normalize_name(&m.name) == wanted) {
            debug!(
                payment_method = %remote_name,
                external_id = payment_method_external_id,
                "payment method matched by normalized name"
            );
            self.payment_method_memo.insert(memo_key, found.id).await;
            return Ok(found.id);
        }

        let created = self
            .store
            .upsert_payment_method(
                user_id,
                &LedgerPaymentMethod {
                    external_id: payment_method_external_id.to_string(),
                    name: remote_name.clone(),
                },
            )
            .await?;
        info!(
            payment_method = %remote_name,
            external_id = payment_method_external_id,
            "payment method created"
        );
        self.payment_method_memo.insert(memo_key, created.id).await;
        Ok(created.id)
    }

    /// Resolve, but degrade to `None` when resolution fails; entries persist
    /// without a category and get backfilled on a later sync.
    pub async fn resolve_category_or_none(
        &self,
        user_id: Uuid,
        access_token: &str,
        category_external_id: Option<&str>,
    ) -> Option<Uuid> {
        let external_id = category_external_id?;
        match self.resolve_category(user_id, access_token, external_id).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(external_id, error = %err, "category resolution failed");
                None
            }
        }
    }

    /// Degrading variant of [`resolve_payment_method`](Self::resolve_payment_method).
    pub async fn resolve_payment_method_or_none(
        &self,
        user_id: Uuid,
        access_token: &str,
        payment_method_external_id: Option<&str>,
    ) -> Option<Uuid> {
        let external_id = payment_method_external_id?;
        match self.resolve_payment_method(user_id, access_token, external_id).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(external_id, error = %err, "payment-method resolution failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use syncline_core::{StoredCategory, StoredPaymentMethod};
    use syncline_domain::{
        DerivedFreight, EntryKind, LedgerEntry, MarketplaceOrder, SynclineError,
    };

    use super::*;

    #[derive(Default)]
    struct MockStore {
        categories: Mutex<Vec<StoredCategory>>,
        payment_methods: Mutex<Vec<StoredPaymentMethod>>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for MockStore {
        async fn upsert_order(
            &self,
            _user_id: Uuid,
            _order: &MarketplaceOrder,
            _freight: Option<&DerivedFreight>,
        ) -> Result<()> {
            Ok(())
        }

        async fn upsert_entry(
            &self,
            _user_id: Uuid,
            _entry: &LedgerEntry,
            _category_id: Option<Uuid>,
            _payment_method_id: Option<Uuid>,
        ) -> Result<()> {
            Ok(())
        }

        async fn upsert_category(
            &self,
            _user_id: Uuid,
            category: &LedgerCategory,
        ) -> Result<StoredCategory> {
            let stored = StoredCategory {
                id: Uuid::now_v7(),
                external_id: category.external_id.clone(),
                name: category.name.clone(),
            };
            self.categories
                .lock()
                .map_err(|_| SynclineError::Internal("mock mutex poisoned".into()))?
                .push(stored.clone());
            Ok(stored)
        }

        async fn categories_for_user(&self, _user_id: Uuid) -> Result<Vec<StoredCategory>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .categories
                .lock()
                .map_err(|_| SynclineError::Internal("mock mutex poisoned".into()))?
                .clone())
        }

        async fn upsert_payment_method(
            &self,
            _user_id: Uuid,
            payment_method: &LedgerPaymentMethod,
        ) -> Result<StoredPaymentMethod> {
            let stored = StoredPaymentMethod {
                id: Uuid::now_v7(),
                external_id: payment_method.external_id.clone(),
                name: payment_method.name.clone(),
            };
            self.payment_methods
                .lock()
                .map_err(|_| SynclineError::Internal("mock mutex poisoned".into()))?
                .push(stored.clone());
            Ok(stored)
        }

        async fn payment_methods_for_user(
            &self,
            _user_id: Uuid,
        ) -> Result<Vec<StoredPaymentMethod>> {
            Ok(self
                .payment_methods
                .lock()
                .map_err(|_| SynclineError::Internal("mock mutex poisoned".into()))?
                .clone())
        }
    }

    struct MockLedger {
        categories: Vec<LedgerCategory>,
        payment_methods: Vec<LedgerPaymentMethod>,
        detail_calls: AtomicUsize,
    }

    #[async_trait]
    impl LedgerApi for MockLedger {
        async fn list_entries(
            &self,
            _access_token: &str,
            _kind: EntryKind,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<LedgerEntry>> {
            Ok(vec![])
        }

        async fn entry_detail(
            &self,
            _access_token: &str,
            _kind: EntryKind,
            _entry_id: &str,
        ) -> Result<LedgerEntry> {
            Err(SynclineError::NotFound("entry".into()))
        }

        async fn list_categories(&self, _access_token: &str) -> Result<Vec<LedgerCategory>> {
            Ok(self.categories.clone())
        }

        async fn category_detail(
            &self,
            _access_token: &str,
            category_id: &str,
        ) -> Result<LedgerCategory> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            self.categories
                .iter()
                .find(|c| c.external_id == category_id)
                .cloned()
                .ok_or_else(|| SynclineError::NotFound("category".into()))
        }

        async fn list_payment_methods(
            &self,
            _access_token: &str,
        ) -> Result<Vec<LedgerPaymentMethod>> {
            Ok(self.payment_methods.clone())
        }

        async fn payment_method_detail(
            &self,
            _access_token: &str,
            payment_method_id: &str,
        ) -> Result<LedgerPaymentMethod> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            self.payment_methods
                .iter()
                .find(|m| m.external_id == payment_method_id)
                .cloned()
                .ok_or_else(|| SynclineError::NotFound("payment method".into()))
        }
    }

    fn resolver(store: Arc<MockStore>, ledger: MockLedger) -> ReferenceResolver {
        ReferenceResolver::new(Arc::new(ledger), store, ReferenceResolverConfig::default())
    }

    fn ledger_with(categories: Vec<LedgerCategory>) -> MockLedger {
        MockLedger {
            categories,
            payment_methods: vec![],
            detail_calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn stored_external_id_resolves_without_an_api_call() {
        let store = Arc::new(MockStore::default());
        let stored = store
            .upsert_category(
                Uuid::nil(),
                &LedgerCategory { external_id: "cat-1".into(), name: "Frete".into() },
            )
            .await
            .unwrap();
        let resolver = resolver(Arc::clone(&store), ledger_with(vec![]));

        let id = resolver.resolve_category(Uuid::nil(), "at", "cat-1").await.unwrap();
        assert_eq!(id, stored.id);
    }

    #[tokio::test]
    async fn normalized_name_match_reuses_the_stored_category() {
        let store = Arc::new(MockStore::default());
        let stored = store
            .upsert_category(
                Uuid::nil(),
                &LedgerCategory { external_id: "cat-old".into(), name: "Frete e Logística".into() },
            )
            .await
            .unwrap();
        let ledger = ledger_with(vec![LedgerCategory {
            external_id: "cat-new".into(),
            name: "FRETE E LOGISTICA".into(),
        }]);
        let resolver = resolver(Arc::clone(&store), ledger);

        let id = resolver.resolve_category(Uuid::nil(), "at", "cat-new").await.unwrap();
        assert_eq!(id, stored.id);
        // No duplicate was created.
        assert_eq!(store.categories.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_category_is_created_on_demand() {
        let store = Arc::new(MockStore::default());
        let ledger = ledger_with(vec![LedgerCategory {
            external_id: "cat-7".into(),
            name: "Impostos".into(),
        }]);
        let resolver = resolver(Arc::clone(&store), ledger);

        let id = resolver.resolve_category(Uuid::nil(), "at", "cat-7").await.unwrap();
        let categories = store.categories.lock().unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].id, id);
        assert_eq!(categories[0].external_id, "cat-7");
    }

    #[tokio::test]
    async fn second_resolution_is_served_from_the_memo() {
        let store = Arc::new(MockStore::default());
        store
            .upsert_category(
                Uuid::nil(),
                &LedgerCategory { external_id: "cat-1".into(), name: "Frete".into() },
            )
            .await
            .unwrap();
        let resolver = resolver(Arc::clone(&store), ledger_with(vec![]));

        let first = resolver.resolve_category(Uuid::nil(), "at", "cat-1").await.unwrap();
        let lookups_after_first = store.lookups.load(Ordering::SeqCst);
        let second = resolver.resolve_category(Uuid::nil(), "at", "cat-1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.lookups.load(Ordering::SeqCst), lookups_after_first);
    }

    #[tokio::test]
    async fn resolution_failure_degrades_to_none() {
        let store = Arc::new(MockStore::default());
        let resolver = resolver(store, ledger_with(vec![]));
        let resolved =
            resolver.resolve_category_or_none(Uuid::nil(), "at", Some("cat-missing")).await;
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn stored_payment_method_resolves_by_external_id() {
        let store = Arc::new(MockStore::default());
        let stored = store
            .upsert_payment_method(
                Uuid::nil(),
                &LedgerPaymentMethod { external_id: "pm-1".into(), name: "Boleto".into() },
            )
            .await
            .unwrap();
        let resolver = resolver(Arc::clone(&store), ledger_with(vec![]));

        let id = resolver.resolve_payment_method(Uuid::nil(), "at", "pm-1").await.unwrap();
        assert_eq!(id, stored.id);
    }

    #[tokio::test]
    async fn unknown_payment_method_is_persisted_on_first_sighting() {
        let store = Arc::new(MockStore::default());
        let ledger = MockLedger {
            categories: vec![],
            payment_methods: vec![LedgerPaymentMethod {
                external_id: "pm-9".into(),
                name: "Pix".into(),
            }],
            detail_calls: AtomicUsize::new(0),
        };
        let resolver = resolver(Arc::clone(&store), ledger);

        let id = resolver.resolve_payment_method(Uuid::nil(), "at", "pm-9").await.unwrap();
        let methods = store.payment_methods.lock().unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].id, id);
        assert_eq!(methods[0].name, "Pix");
    }

    #[tokio::test]
    async fn prefetch_skips_detail_lookups_for_listed_references() {
        let store = Arc::new(MockStore::default());
        let ledger = MockLedger {
            categories: vec![LedgerCategory {
                external_id: "cat-3".into(),
                name: "Taxas".into(),
            }],
            payment_methods: vec![LedgerPaymentMethod {
                external_id: "pm-3".into(),
                name: "Cartão".into(),
            }],
            detail_calls: AtomicUsize::new(0),
        };
        let ledger = Arc::new(ledger);
        let resolver = ReferenceResolver::new(
            Arc::clone(&ledger) as Arc<dyn LedgerApi>,
            Arc::clone(&store) as Arc<dyn RecordStore>,
            ReferenceResolverConfig::default(),
        );

        resolver.prefetch(Uuid::nil(), "at").await.unwrap();
        resolver.resolve_category(Uuid::nil(), "at", "cat-3").await.unwrap();
        resolver.resolve_payment_method(Uuid::nil(), "at", "pm-3").await.unwrap();

        // Both names came out of the prefetched listing caches.
        assert_eq!(ledger.detail_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.categories.lock().unwrap().len(), 1);
        assert_eq!(store.payment_methods.lock().unwrap().len(), 1);
    }
}
