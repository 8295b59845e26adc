//! Sync orchestrator
//!
//! Drives one account through the phase sequence: token readiness, range
//! partitioning, paginated fetch, throttled detail resolution, persistence.
//! Partial success is the normal shape; per-window and per-record failures
//! accumulate in the summary while the run keeps going. Only token failure,
//! cancellation and whole-range errors fail a run outright.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use syncline_core::{
    derive_freight, AccountRepository, LedgerApi, MarketplaceApi, PartitionOutcome, ProgressSink,
    RangeCounter, RangePartitioner, RecordStore,
};
use syncline_domain::{
    AccountId, EngineConfig, EntryKind, FreightInput, LedgerEntry, LogisticType,
    MarketplaceOrder, Provider, Result, SyncEvent, SyncPhase, SyncSummary, SynclineError,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::TokenLifecycleManager;
use crate::integrations::ledger::ReferenceResolver;
use crate::integrations::marketplace::PaginatedFetcher;
use crate::sync::session::SyncSession;
use crate::throttle::ThrottledResolver;

pub struct SyncOrchestrator {
    accounts: Arc<dyn AccountRepository>,
    marketplace: Arc<dyn MarketplaceApi>,
    ledger: Arc<dyn LedgerApi>,
    store: Arc<dyn RecordStore>,
    progress: Arc<dyn ProgressSink>,
    tokens: Arc<TokenLifecycleManager>,
    references: Arc<ReferenceResolver>,
    throttle: ThrottledResolver,
    config: EngineConfig,
}

impl SyncOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        marketplace: Arc<dyn MarketplaceApi>,
        ledger: Arc<dyn LedgerApi>,
        store: Arc<dyn RecordStore>,
        progress: Arc<dyn ProgressSink>,
        tokens: Arc<TokenLifecycleManager>,
        references: Arc<ReferenceResolver>,
        config: EngineConfig,
    ) -> Self {
        let throttle = ThrottledResolver::new(config.throttle.clone());
        Self {
            accounts,
            marketplace,
            ledger,
            store,
            progress,
            tokens,
            references,
            throttle,
            config,
        }
    }

    /// Sync every account over the range. Accounts are isolated: one
    /// account's failure never stops its siblings, and each gets its own
    /// summary. Cancelling the token stops scheduling further accounts and
    /// interrupts the one in flight.
    pub async fn sync_all_accounts(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<Vec<(AccountId, SyncSummary)>> {
        let accounts = self.accounts.list_accounts(None).await?;
        let mut results = Vec::with_capacity(accounts.len());

        for account in accounts {
            if cancel.is_cancelled() {
                break;
            }
            let session = SyncSession::with_cancel(account, from, to, cancel.clone());
            let account_id = session.account.id;
            let summary = self.sync_session(&session).await;
            results.push((account_id, summary));
        }

        Ok(results)
    }

    /// Run one session to completion. Never returns an error: a failed run
    /// comes back as a summary in the `Failed` phase carrying whatever
    /// partial progress was made.
    #[instrument(skip(self, session), fields(session_id = %session.id, account_id = %session.account.id))]
    pub async fn sync_session(&self, session: &SyncSession) -> SyncSummary {
        let mut summary = SyncSummary::new();
        self.emit(SyncEvent::Start {
            message: format!("sync started for account {}", session.account.external_account_id),
        })
        .await;

        let result = match session.account.provider {
            Provider::Marketplace => self.sync_marketplace(session, &mut summary).await,
            Provider::Ledger => self.sync_ledger(session, &mut summary).await,
        };

        match result {
            Ok(()) => {
                summary.phase = SyncPhase::Done;
                info!(
                    synced = summary.synced,
                    total = summary.total,
                    errors = summary.errors.len(),
                    "sync finished"
                );
                self.emit(SyncEvent::Complete {
                    message: format!("synced {}/{} records", summary.synced, summary.total),
                })
                .await;
            }
            Err(err) => {
                warn!(error = %err, phase = ?summary.phase, "sync failed");
                summary.record_error(err.to_string());
                summary.phase = SyncPhase::Failed;
                self.emit(SyncEvent::Error { message: err.to_string() }).await;
            }
        }

        summary
    }

    async fn sync_marketplace(
        &self,
        session: &SyncSession,
        summary: &mut SyncSummary,
    ) -> Result<()> {
        summary.phase = SyncPhase::TokenReady;
        self.tokens.smart_refresh(session.account.id).await?;
        let account = self.accounts.get_account(session.account.id).await?;
        let token = account.access_token.clone();
        let seller = account.external_account_id.clone();

        summary.phase = SyncPhase::Ranging;
        let counter = OrderCounter {
            api: self.marketplace.as_ref(),
            access_token: &token,
            seller_id: &seller,
        };
        let PartitionOutcome { windows, errors } =
            RangePartitioner::new(&counter, &self.config.partition)
                .partition(session.from, session.to, session.cancel_token())
                .await?;
        for error in errors {
            summary.record_error(error);
        }
        self.emit(SyncEvent::Progress {
            message: "date range partitioned".into(),
            value: 0,
            max: windows.len() as u64,
        })
        .await;

        summary.phase = SyncPhase::Fetching;
        let fetcher = PaginatedFetcher::new(self.marketplace.as_ref(), &self.config.paging);
        let mut orders: Vec<MarketplaceOrder> = Vec::new();
        let window_count = windows.len() as u64;
        for (index, window) in windows.iter().enumerate() {
            let outcome = fetcher
                .fetch_window(&token, &seller, window, session.cancel_token())
                .await?;
            for error in outcome.errors {
                summary.record_error(error);
            }
            orders.extend(outcome.orders);
            self.emit(SyncEvent::Progress {
                message: format!("fetched window {}", index + 1),
                value: index as u64 + 1,
                max: window_count,
            })
            .await;
        }
        summary.total = orders.len() as u64;

        summary.phase = SyncPhase::Resolving;
        let resolved = self
            .throttle
            .resolve_all(orders, session.cancel_token(), |mut order| {
                let token = token.clone();
                async move {
                    let mut detail_error = None;
                    // Search payloads sometimes omit shipping; the order
                    // detail fills the gap.
                    if order.shipment_id.is_none() {
                        match self.marketplace.order_detail(&token, &order.external_id).await {
                            Ok(detail) => {
                                order.shipping_cost = order.shipping_cost.or(detail.shipping_cost);
                                order.shipment_id = detail.shipment_id;
                            }
                            Err(err) => {
                                warn!(
                                    order_id = %order.external_id,
                                    error = %err,
                                    "order detail failed"
                                );
                            }
                        }
                    }
                    if let Some(shipment_id) = order.shipment_id.clone() {
                        match self.marketplace.shipment_detail(&token, &shipment_id).await {
                            Ok(shipment) => order.shipment = Some(shipment),
                            Err(err) => {
                                // Order persists without freight; backfilled
                                // on a later sync.
                                warn!(
                                    order_id = %order.external_id,
                                    shipment_id = %shipment_id,
                                    error = %err,
                                    "shipment detail failed"
                                );
                                detail_error =
                                    Some(format!("shipment {shipment_id}: {err}"));
                            }
                        }
                    }
                    Ok((order, detail_error))
                }
            })
            .await;
        if session.is_cancelled() {
            return Err(SynclineError::Cancelled);
        }

        summary.phase = SyncPhase::Persisting;
        for item in resolved {
            let (order, detail_error) = match item {
                Ok(pair) => pair,
                Err(err) => {
                    summary.record_error(err.to_string());
                    continue;
                }
            };
            if let Some(message) = detail_error {
                summary.record_error(message);
            }

            let freight = freight_input(&order).map(|input| derive_freight(&input));
            match self.store.upsert_order(account.user_id, &order, freight.as_ref()).await {
                Ok(()) => summary.synced += 1,
                Err(err) => {
                    warn!(order_id = %order.external_id, error = %err, "order upsert failed");
                    summary.record_error(format!("order {}: {err}", order.external_id));
                }
            }
        }

        Ok(())
    }

    async fn sync_ledger(&self, session: &SyncSession, summary: &mut SyncSummary) -> Result<()> {
        summary.phase = SyncPhase::TokenReady;
        self.tokens.smart_refresh(session.account.id).await?;
        let account = self.accounts.get_account(session.account.id).await?;
        let token = account.access_token.clone();

        summary.phase = SyncPhase::Fetching;
        let mut entries: Vec<LedgerEntry> = Vec::new();
        for kind in [EntryKind::Payable, EntryKind::Receivable] {
            if session.is_cancelled() {
                return Err(SynclineError::Cancelled);
            }
            match self.ledger.list_entries(&token, kind, session.from, session.to).await {
                Ok(batch) => entries.extend(batch),
                Err(err) => {
                    warn!(kind = kind.as_str(), error = %err, "entry listing failed");
                    summary.record_error(format!("{} listing: {err}", kind.as_str()));
                }
            }
        }
        summary.total = entries.len() as u64;
        self.emit(SyncEvent::Progress {
            message: "ledger entries listed".into(),
            value: 0,
            max: summary.total,
        })
        .await;

        summary.phase = SyncPhase::Resolving;
        self.references.prefetch(account.user_id, &token).await?;
        let resolved = self
            .throttle
            .resolve_all(entries, session.cancel_token(), |mut entry| {
                let token = token.clone();
                async move {
                    // List payloads may omit the category or payment method;
                    // the detail call backfills them before resolution.
                    if entry.category_external_id.is_none()
                        || entry.payment_method_external_id.is_none()
                    {
                        match self
                            .ledger
                            .entry_detail(&token, entry.kind, &entry.external_id)
                            .await
                        {
                            Ok(detail) => {
                                entry.category_external_id = entry
                                    .category_external_id
                                    .or(detail.category_external_id);
                                entry.payment_method_external_id = entry
                                    .payment_method_external_id
                                    .or(detail.payment_method_external_id);
                            }
                            Err(err) => {
                                warn!(
                                    entry_id = %entry.external_id,
                                    error = %err,
                                    "entry detail failed"
                                );
                            }
                        }
                    }
                    let category_id = self
                        .references
                        .resolve_category_or_none(
                            account.user_id,
                            &token,
                            entry.category_external_id.as_deref(),
                        )
                        .await;
                    let payment_method_id = self
                        .references
                        .resolve_payment_method_or_none(
                            account.user_id,
                            &token,
                            entry.payment_method_external_id.as_deref(),
                        )
                        .await;
                    Ok((entry, category_id, payment_method_id))
                }
            })
            .await;
        if session.is_cancelled() {
            return Err(SynclineError::Cancelled);
        }

        summary.phase = SyncPhase::Persisting;
        for item in resolved {
            let (entry, category_id, payment_method_id) = match item {
                Ok(triple) => triple,
                Err(err) => {
                    summary.record_error(err.to_string());
                    continue;
                }
            };
            match self
                .store
                .upsert_entry(account.user_id, &entry, category_id, payment_method_id)
                .await
            {
                Ok(()) => summary.synced += 1,
                Err(err) => {
                    warn!(entry_id = %entry.external_id, error = %err, "entry upsert failed");
                    summary.record_error(format!("entry {}: {err}", entry.external_id));
                }
            }
        }

        Ok(())
    }

    async fn emit(&self, event: SyncEvent) {
        self.progress.emit(event).await;
    }
}

/// Count probe over the order search endpoint.
struct OrderCounter<'a> {
    api: &'a dyn MarketplaceApi,
    access_token: &'a str,
    seller_id: &'a str,
}

#[async_trait]
impl RangeCounter for OrderCounter<'_> {
    async fn count(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<u64> {
        self.api.count_orders(self.access_token, self.seller_id, from, to).await
    }
}

/// Cost inputs for the freight policy; `None` when the order has no
/// shipment detail attached.
fn freight_input(order: &MarketplaceOrder) -> Option<FreightInput> {
    let shipment = order.shipment.as_ref()?;
    Some(FreightInput {
        logistic_type: LogisticType::parse(&shipment.logistic_type),
        unit_price: order.unit_price,
        quantity: order.quantity,
        base_cost: shipment.base_cost.unwrap_or(0.0),
        list_cost: shipment.list_cost.unwrap_or(0.0),
        shipping_option_cost: shipment.shipping_option.as_ref().and_then(|o| o.cost),
        shipment_cost: shipment.shipment_cost,
        order_shipping_cost: order.shipping_cost,
    })
}
