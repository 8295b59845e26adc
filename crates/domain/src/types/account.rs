//! External accounts and token lifecycle state

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal account identifier.
pub type AccountId = Uuid;

/// Which third-party platform an account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Order marketplace (orders, shipments).
    Marketplace,
    /// Accounting platform (payables, receivables, categories).
    Ledger,
}

/// One credential set per (user, provider).
///
/// `refresh_invalid_until`, when set and in the future, marks quarantine:
/// passive refresh is skipped and only a forced or manual refresh may clear
/// it. The sync engine never deletes accounts; permanently revoked refresh
/// tokens are the caller's responsibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalAccount {
    pub id: AccountId,
    pub user_id: Uuid,
    pub provider: Provider,
    /// Identifier the provider knows this account by (e.g. seller id).
    pub external_account_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_invalid_until: Option<DateTime<Utc>>,
}

impl ExternalAccount {
    /// Derive the current token state. See [`TokenState::of`].
    pub fn token_state(&self, refresh_threshold_hours: i64) -> TokenState {
        TokenState::of(self, Utc::now(), refresh_threshold_hours)
    }
}

/// Explicit token lifecycle state.
///
/// The persisted representation stays timestamp-based (the account store is
/// an external collaborator); this enum is the in-engine truth, so the legal
/// transitions are type-checked rather than inferred from timestamp
/// comparisons scattered around the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TokenState {
    /// Expiry is far enough in the future.
    Valid,
    /// Within the refresh threshold of expiry; no side effect until a refresh
    /// is actually invoked.
    NeedsRefresh,
    /// Recent refresh failures indicate a likely-invalid refresh token;
    /// passive refresh is skipped until `until`.
    Quarantined { until: DateTime<Utc> },
    /// The quarantine marker has lapsed but is still set; the next refresh
    /// is the recovery attempt that clears it.
    Recovering,
}

impl TokenState {
    /// Classify an account at instant `now`.
    pub fn of(account: &ExternalAccount, now: DateTime<Utc>, threshold_hours: i64) -> Self {
        if let Some(until) = account.refresh_invalid_until {
            if until > now {
                return Self::Quarantined { until };
            }
            return Self::Recovering;
        }
        if account.expires_at - now <= Duration::hours(threshold_hours) {
            Self::NeedsRefresh
        } else {
            Self::Valid
        }
    }

    pub fn is_quarantined(&self) -> bool {
        matches!(self, Self::Quarantined { .. })
    }
}

/// Successful response from a provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Present only when the provider rotates refresh tokens.
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds, as reported by the provider.
    pub expires_in: i64,
}
