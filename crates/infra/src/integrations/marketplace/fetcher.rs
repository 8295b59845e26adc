//! Paginated order fetcher
//!
//! Walks a partitioned window through the search endpoint page by page.
//! The first successful page re-anchors the expected total (counts drift
//! between the probe and the fetch); a failed page is skipped rather than
//! aborting the window.

use chrono::{DateTime, Utc};
use syncline_core::MarketplaceApi;
use syncline_domain::{
    DateRangeWindow, MarketplaceOrder, PagingConfig, Result, SynclineError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Orders collected from one window, plus the page errors skipped over.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub orders: Vec<MarketplaceOrder>,
    pub errors: Vec<String>,
}

pub struct PaginatedFetcher<'a, A: MarketplaceApi + ?Sized> {
    api: &'a A,
    config: &'a PagingConfig,
}

impl<'a, A: MarketplaceApi + ?Sized> PaginatedFetcher<'a, A> {
    pub fn new(api: &'a A, config: &'a PagingConfig) -> Self {
        Self { api, config }
    }

    /// Fetch every page of a window. The walk stops at the provider's offset
    /// ceiling even if the window reports more results; the partitioner is
    /// responsible for keeping windows under that ceiling.
    pub async fn fetch_window(
        &self,
        access_token: &str,
        seller_id: &str,
        window: &DateRangeWindow,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let page_size = self.config.page_size.max(1);
        let mut offset: u64 = 0;
        let mut expected = window.estimated_total.unwrap_or(u64::MAX);
        let mut anchored = false;
        let mut outcome = FetchOutcome::default();

        loop {
            if cancel.is_cancelled() {
                return Err(SynclineError::Cancelled);
            }
            if offset >= expected.min(self.config.max_offset) {
                break;
            }

            match self
                .api
                .search_orders(access_token, seller_id, window.from, window.to, page_size, offset)
                .await
            {
                Ok(page) => {
                    // The live total supersedes the probe estimate.
                    if !anchored {
                        expected = page.paging_total;
                        anchored = true;
                    }
                    if page.results.is_empty() {
                        break;
                    }
                    let fetched = page.results.len() as u64;
                    outcome.orders.extend(page.results);
                    offset += fetched.max(page_size);
                }
                Err(SynclineError::Cancelled) => return Err(SynclineError::Cancelled),
                Err(err) => {
                    warn!(
                        seller_id,
                        offset,
                        from = %window.from,
                        to = %window.to,
                        error = %err,
                        "page fetch failed, skipping page"
                    );
                    outcome.errors.push(format!("page at offset {offset}: {err}"));
                    offset += page_size;
                }
            }
        }

        debug!(
            seller_id,
            from = %window.from,
            to = %window.to,
            fetched = outcome.orders.len(),
            skipped_pages = outcome.errors.len(),
            "window fetched"
        );
        Ok(outcome)
    }
}
