//! Per-run sync context
//!
//! One session covers one account over one date range. The cancellation
//! token is threaded through every stage; cancelling the session stops
//! partitioning, fetching and resolution at the next checkpoint.

use chrono::{DateTime, Utc};
use syncline_domain::ExternalAccount;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SyncSession {
    pub id: Uuid,
    pub account: ExternalAccount,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl SyncSession {
    pub fn new(account: ExternalAccount, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self::with_cancel(account, from, to, CancellationToken::new())
    }

    /// Session tied to an outer token; cancelling the parent cancels every
    /// session derived from it.
    pub fn with_cancel(
        account: ExternalAccount,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        parent: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            account,
            from,
            to,
            started_at: Utc::now(),
            cancel: parent.child_token(),
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
