//! Token lifecycle manager
//!
//! Keeps external account tokens usable: proactive refresh ahead of expiry,
//! classification of refresh failures, quarantine of accounts whose refresh
//! grant is dead, and a forced "smart refresh" sequence for stubborn tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use syncline_core::{AccountRepository, FailureTracker, TokenEndpoint};
use syncline_domain::{
    AccountId, ExternalAccount, Provider, RefreshReport, Result, SynclineError, TokenConfig,
    TokenState, EXPIRY_SAFETY_MARGIN_SECS, MIN_TOKEN_LIFETIME_SECS,
};
use tracing::{debug, info, warn};

use crate::backoff::{is_recoverable, Backoff};

pub struct TokenLifecycleManager {
    accounts: Arc<dyn AccountRepository>,
    endpoints: HashMap<Provider, Arc<dyn TokenEndpoint>>,
    failures: FailureTracker,
    config: TokenConfig,
    backoff: Backoff,
}

impl TokenLifecycleManager {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        endpoints: HashMap<Provider, Arc<dyn TokenEndpoint>>,
        config: TokenConfig,
    ) -> Self {
        let failures = FailureTracker::new(config.failure_window_secs);
        Self {
            accounts,
            endpoints,
            failures,
            config,
            backoff: Backoff::new(3, Duration::from_millis(500), Duration::from_secs(10)),
        }
    }

    /// Current token state for an account.
    pub fn state_of(&self, account: &ExternalAccount) -> TokenState {
        TokenState::of(account, Utc::now(), self.config.refresh_threshold_hours)
    }

    /// Refresh one account's token pair and persist the result atomically.
    /// Clears the failure count and any quarantine marker on success.
    ///
    /// Invalid-grant failures are counted toward quarantine for marketplace
    /// accounts; a ledger account's invalid grant surfaces immediately
    /// because its tokens cannot be re-consented in the background.
    pub async fn refresh_account(&self, account: &ExternalAccount) -> Result<()> {
        let endpoint = self.endpoints.get(&account.provider).ok_or_else(|| {
            SynclineError::Config(format!("no token endpoint for {:?}", account.provider))
        })?;

        let refresh_token = account.refresh_token.clone();
        let refreshed = self
            .backoff
            .execute_if("token_refresh", is_recoverable, || endpoint.refresh(&refresh_token))
            .await;

        let token = match refreshed {
            Ok(token) => token,
            Err(SynclineError::InvalidGrant(detail)) => {
                return Err(self.handle_invalid_grant(account, detail).await);
            }
            Err(err) => return Err(err),
        };

        // Safety margin against clock skew, floored so a pathological
        // expires_in never yields an already-expired token.
        let lifetime =
            (token.expires_in - EXPIRY_SAFETY_MARGIN_SECS).max(MIN_TOKEN_LIFETIME_SECS);
        let expires_at = Utc::now() + ChronoDuration::seconds(lifetime);

        // New refresh token when rotated, otherwise the old one stays valid.
        let next_refresh = token.refresh_token.as_deref().unwrap_or(&account.refresh_token);

        self.accounts
            .update_tokens(account.id, &token.access_token, next_refresh, expires_at)
            .await?;

        self.failures.clear(account.id);
        if account.refresh_invalid_until.is_some() {
            self.accounts.clear_quarantine(account.id).await?;
            info!(account_id = %account.id, "account recovered from quarantine");
        }

        debug!(account_id = %account.id, %expires_at, "token refreshed");
        Ok(())
    }

    async fn handle_invalid_grant(
        &self,
        account: &ExternalAccount,
        detail: String,
    ) -> SynclineError {
        if account.provider != Provider::Marketplace {
            warn!(account_id = %account.id, "ledger refresh grant rejected");
            return SynclineError::InvalidGrant(detail);
        }

        let count = self.failures.record_failure(account.id);
        warn!(
            account_id = %account.id,
            consecutive_failures = count,
            "marketplace refresh grant rejected"
        );

        if count >= self.config.quarantine_failure_threshold {
            let until = Utc::now() + ChronoDuration::hours(self.config.quarantine_duration_hours);
            if let Err(err) = self.accounts.set_quarantine(account.id, until).await {
                warn!(account_id = %account.id, error = %err, "failed to persist quarantine");
            } else {
                warn!(account_id = %account.id, %until, "account quarantined");
            }
        }

        SynclineError::InvalidGrant(detail)
    }

    /// Forced refresh sequence for a token the passive path keeps missing.
    ///
    /// The first attempts are passive (a no-op when the token is already
    /// valid); the remaining ones force a refresh regardless. A settle delay
    /// precedes the final two attempts to let provider-side propagation
    /// catch up.
    pub async fn smart_refresh(&self, account_id: AccountId) -> Result<()> {
        let max = self.config.smart_refresh_max_attempts.max(1);
        let passive = self.config.smart_refresh_passive_attempts.min(max);
        let mut last_err = None;

        for attempt in 1..=max {
            let account = self.accounts.get_account(account_id).await?;
            let state = self.state_of(&account);

            if attempt <= passive && state == TokenState::Valid {
                debug!(account_id = %account_id, attempt, "token already valid");
                return Ok(());
            }

            if let TokenState::Quarantined { until } = state {
                return Err(SynclineError::Auth(format!(
                    "account quarantined until {until}"
                )));
            }

            if max - attempt < 2 {
                tokio::time::sleep(self.config.smart_refresh_settle_delay).await;
            }

            match self.refresh_account(&account).await {
                Ok(()) => return Ok(()),
                Err(err @ SynclineError::InvalidGrant(_)) => return Err(err),
                Err(err) => {
                    warn!(account_id = %account_id, attempt, error = %err, "smart refresh attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| SynclineError::Internal("smart refresh produced no result".into())))
    }

    /// Bring every account of a provider (or all providers) to a usable
    /// token, refreshing the ones near expiry. Quarantined accounts get one
    /// forced recovery attempt; success clears the marker and is reported as
    /// recovered. Per-account failures are isolated.
    pub async fn ensure_accounts_ready(&self, provider: Option<Provider>) -> Result<RefreshReport> {
        let accounts = self.accounts.list_accounts(provider).await?;
        let mut report = RefreshReport::default();

        for account in &accounts {
            match self.state_of(account) {
                TokenState::Valid => {
                    report.success.push(account.id);
                }
                TokenState::Quarantined { until } => {
                    // The passive path stays blocked for a quarantined
                    // account, so recovery has to be a forced refresh.
                    debug!(account_id = %account.id, %until, "quarantined account, forcing a recovery attempt");
                    match self.refresh_account(account).await {
                        Ok(()) => {
                            report.success.push(account.id);
                            report.recovered.push(account.id);
                        }
                        Err(err) => {
                            debug!(account_id = %account.id, error = %err, "quarantined account did not recover");
                            report.failed.push(account.id);
                        }
                    }
                }
                state @ (TokenState::NeedsRefresh | TokenState::Recovering) => {
                    let recovering = matches!(state, TokenState::Recovering);
                    match self.smart_refresh(account.id).await {
                        Ok(()) => {
                            report.success.push(account.id);
                            if recovering {
                                report.recovered.push(account.id);
                            }
                        }
                        Err(err) => {
                            warn!(account_id = %account.id, error = %err, "refresh failed");
                            report.failed.push(account.id);
                        }
                    }
                }
            }
        }

        info!(
            success = report.success.len(),
            failed = report.failed.len(),
            recovered = report.recovered.len(),
            "accounts readied"
        );
        Ok(report)
    }

    /// Maintenance sweep over quarantined accounts: one forced refresh each.
    /// Success clears the quarantine; failure leaves the marker untouched.
    pub async fn recover_quarantined(&self) -> Result<Vec<AccountId>> {
        let accounts = self.accounts.list_accounts(None).await?;
        let mut recovered = Vec::new();

        for account in &accounts {
            if !self.state_of(account).is_quarantined() {
                continue;
            }
            match self.refresh_account(account).await {
                Ok(()) => recovered.push(account.id),
                Err(err) => {
                    debug!(account_id = %account.id, error = %err, "quarantined account did not recover");
                }
            }
        }

        if !recovered.is_empty() {
            info!(count = recovered.len(), "quarantined accounts recovered");
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use syncline_domain::RefreshedToken;
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct MockAccounts {
        accounts: Mutex<Vec<ExternalAccount>>,
        quarantines: Mutex<Vec<(AccountId, DateTime<Utc>)>>,
        cleared: Mutex<Vec<AccountId>>,
        token_updates: Mutex<Vec<(AccountId, String, String, DateTime<Utc>)>>,
    }

    #[async_trait]
    impl AccountRepository for MockAccounts {
        async fn list_accounts(&self, provider: Option<Provider>) -> Result<Vec<ExternalAccount>> {
            let accounts = self.accounts.lock().map_err(|_| poisoned())?;
            Ok(accounts
                .iter()
                .filter(|a| provider.map_or(true, |p| a.provider == p))
                .cloned()
                .collect())
        }

        async fn get_account(&self, id: Uuid) -> Result<ExternalAccount> {
            let accounts = self.accounts.lock().map_err(|_| poisoned())?;
            accounts
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .ok_or_else(|| SynclineError::NotFound("account".into()))
        }

        async fn update_tokens(
            &self,
            id: Uuid,
            access_token: &str,
            refresh_token: &str,
            expires_at: DateTime<Utc>,
        ) -> Result<()> {
            let mut accounts = self.accounts.lock().map_err(|_| poisoned())?;
            if let Some(account) = accounts.iter_mut().find(|a| a.id == id) {
                account.access_token = access_token.to_string();
                account.refresh_token = refresh_token.to_string();
                account.expires_at = expires_at;
            }
            self.token_updates.lock().map_err(|_| poisoned())?.push((
                id,
                access_token.to_string(),
                refresh_token.to_string(),
                expires_at,
            ));
            Ok(())
        }

        async fn set_quarantine(&self, id: Uuid, until: DateTime<Utc>) -> Result<()> {
            let mut accounts = self.accounts.lock().map_err(|_| poisoned())?;
            if let Some(account) = accounts.iter_mut().find(|a| a.id == id) {
                account.refresh_invalid_until = Some(until);
            }
            self.quarantines.lock().map_err(|_| poisoned())?.push((id, until));
            Ok(())
        }

        async fn clear_quarantine(&self, id: Uuid) -> Result<()> {
            let mut accounts = self.accounts.lock().map_err(|_| poisoned())?;
            if let Some(account) = accounts.iter_mut().find(|a| a.id == id) {
                account.refresh_invalid_until = None;
            }
            self.cleared.lock().map_err(|_| poisoned())?.push(id);
            Ok(())
        }
    }

    fn poisoned() -> SynclineError {
        SynclineError::Internal("mock mutex poisoned".into())
    }

    struct ScriptedEndpoint {
        responses: Mutex<Vec<Result<RefreshedToken>>>,
    }

    impl ScriptedEndpoint {
        fn new(responses: Vec<Result<RefreshedToken>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }

        fn always_invalid() -> Self {
            Self::new(vec![])
        }
    }

    #[async_trait]
    impl TokenEndpoint for ScriptedEndpoint {
        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken> {
            let mut responses = self.responses.lock().map_err(|_| poisoned())?;
            if responses.is_empty() {
                return Err(SynclineError::InvalidGrant("grant revoked".into()));
            }
            Ok(responses.remove(0)?)
        }
    }

    fn account(provider: Provider, expires_in_hours: i64) -> ExternalAccount {
        ExternalAccount {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            provider,
            external_account_id: "seller-1".into(),
            access_token: "at-old".into(),
            refresh_token: "rt-old".into(),
            expires_at: Utc::now() + ChronoDuration::hours(expires_in_hours),
            refresh_invalid_until: None,
        }
    }

    fn manager(
        accounts: Arc<MockAccounts>,
        endpoint: Arc<dyn TokenEndpoint>,
        provider: Provider,
    ) -> TokenLifecycleManager {
        let mut endpoints: HashMap<Provider, Arc<dyn TokenEndpoint>> = HashMap::new();
        endpoints.insert(provider, endpoint);
        let config = TokenConfig {
            smart_refresh_settle_delay: Duration::from_millis(1),
            ..TokenConfig::default()
        };
        TokenLifecycleManager::new(accounts, endpoints, config)
    }

    fn good_token(expires_in: i64) -> RefreshedToken {
        RefreshedToken {
            access_token: "at-new".into(),
            refresh_token: Some("rt-new".into()),
            expires_in,
        }
    }

    #[tokio::test]
    async fn successful_refresh_persists_all_token_fields() {
        let acct = account(Provider::Marketplace, 1);
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(good_token(21600))]));
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        mgr.refresh_account(&acct).await.expect("refresh");

        let updates = accounts.token_updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        let (id, access, refresh, expires_at) = &updates[0];
        assert_eq!(*id, acct.id);
        assert_eq!(access, "at-new");
        assert_eq!(refresh, "rt-new");
        // 21600 - 60 margin seconds from now, give or take test time.
        let lifetime = (*expires_at - Utc::now()).num_seconds();
        assert!((21500..=21540).contains(&lifetime));
    }

    #[tokio::test]
    async fn missing_rotated_refresh_token_keeps_the_old_one() {
        let acct = account(Provider::Ledger, 1);
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(RefreshedToken {
            access_token: "at-new".into(),
            refresh_token: None,
            expires_in: 3600,
        })]));
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Ledger);

        mgr.refresh_account(&acct).await.expect("refresh");

        let updates = accounts.token_updates.lock().unwrap();
        assert_eq!(updates[0].2, "rt-old");
    }

    #[tokio::test]
    async fn tiny_expires_in_is_floored_to_the_minimum_lifetime() {
        let acct = account(Provider::Marketplace, 1);
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(good_token(10))]));
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        mgr.refresh_account(&acct).await.expect("refresh");

        let updates = accounts.token_updates.lock().unwrap();
        let lifetime = (updates[0].3 - Utc::now()).num_seconds();
        assert!((25..=30).contains(&lifetime));
    }

    #[tokio::test]
    async fn marketplace_quarantines_after_threshold_invalid_grants() {
        let acct = account(Provider::Marketplace, 1);
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::always_invalid());
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        for _ in 0..4 {
            let err = mgr.refresh_account(&acct).await.unwrap_err();
            assert!(matches!(err, SynclineError::InvalidGrant(_)));
        }
        assert!(accounts.quarantines.lock().unwrap().is_empty());

        // Fifth consecutive failure crosses the threshold.
        let _ = mgr.refresh_account(&acct).await.unwrap_err();
        let quarantines = accounts.quarantines.lock().unwrap();
        assert_eq!(quarantines.len(), 1);
        assert_eq!(quarantines[0].0, acct.id);
        assert!(quarantines[0].1 > Utc::now());
    }

    #[tokio::test]
    async fn ledger_invalid_grant_never_quarantines() {
        let acct = account(Provider::Ledger, 1);
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::always_invalid());
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Ledger);

        for _ in 0..6 {
            let err = mgr.refresh_account(&acct).await.unwrap_err();
            assert!(matches!(err, SynclineError::InvalidGrant(_)));
        }
        assert!(accounts.quarantines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_clears_the_failure_count() {
        let acct = account(Provider::Marketplace, 1);
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![
            Err(SynclineError::InvalidGrant("flaky".into())),
            Ok(good_token(3600)),
        ]));
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        let _ = mgr.refresh_account(&acct).await.unwrap_err();
        assert_eq!(mgr.failures.count(acct.id), 1);

        mgr.refresh_account(&acct).await.expect("refresh");
        assert_eq!(mgr.failures.count(acct.id), 0);
    }

    #[tokio::test]
    async fn recovery_clears_the_quarantine_marker() {
        let mut acct = account(Provider::Marketplace, 1);
        acct.refresh_invalid_until = Some(Utc::now() - ChronoDuration::hours(1));
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(good_token(3600))]));
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        let report = mgr.ensure_accounts_ready(Some(Provider::Marketplace)).await.expect("report");
        assert_eq!(report.success, vec![acct.id]);
        assert_eq!(report.recovered, vec![acct.id]);
        assert_eq!(*accounts.cleared.lock().unwrap(), vec![acct.id]);
    }

    #[tokio::test]
    async fn readying_recovers_an_actively_quarantined_account() {
        let mut acct = account(Provider::Marketplace, 1);
        acct.refresh_invalid_until = Some(Utc::now() + ChronoDuration::hours(12));
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(good_token(3600))]));
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        let report = mgr.ensure_accounts_ready(None).await.expect("report");
        assert_eq!(report.success, vec![acct.id]);
        assert_eq!(report.recovered, vec![acct.id]);
        assert!(report.failed.is_empty());
        assert_eq!(*accounts.cleared.lock().unwrap(), vec![acct.id]);
    }

    #[tokio::test]
    async fn readying_keeps_a_still_dead_quarantined_account_failed() {
        let mut acct = account(Provider::Marketplace, 1);
        acct.refresh_invalid_until = Some(Utc::now() + ChronoDuration::hours(12));
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::always_invalid());
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        let report = mgr.ensure_accounts_ready(None).await.expect("report");
        assert!(report.success.is_empty());
        assert!(report.recovered.is_empty());
        assert_eq!(report.failed, vec![acct.id]);
        assert!(accounts.token_updates.lock().unwrap().is_empty());
        assert!(accounts.cleared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_recovers_only_quarantined_accounts_that_refresh() {
        let mut quarantined = account(Provider::Marketplace, 1);
        quarantined.refresh_invalid_until = Some(Utc::now() + ChronoDuration::hours(6));
        let healthy = account(Provider::Marketplace, 48);
        let accounts = Arc::new(MockAccounts::default());
        {
            let mut all = accounts.accounts.lock().unwrap();
            all.push(quarantined.clone());
            all.push(healthy);
        }
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Ok(good_token(3600))]));
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        let recovered = mgr.recover_quarantined().await.expect("sweep");
        assert_eq!(recovered, vec![quarantined.id]);
        assert_eq!(*accounts.cleared.lock().unwrap(), vec![quarantined.id]);
        // The healthy account was never touched.
        assert_eq!(accounts.token_updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sweep_leaves_the_marker_when_refresh_still_fails() {
        let mut quarantined = account(Provider::Marketplace, 1);
        quarantined.refresh_invalid_until = Some(Utc::now() + ChronoDuration::hours(6));
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(quarantined);
        let endpoint = Arc::new(ScriptedEndpoint::always_invalid());
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        let recovered = mgr.recover_quarantined().await.expect("sweep");
        assert!(recovered.is_empty());
        assert!(accounts.cleared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn smart_refresh_is_a_no_op_for_a_valid_token() {
        let acct = account(Provider::Marketplace, 48);
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::always_invalid());
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        mgr.smart_refresh(acct.id).await.expect("smart refresh");
        assert!(accounts.token_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn smart_refresh_forces_past_transient_failures() {
        let acct = account(Provider::Marketplace, 1);
        let accounts = Arc::new(MockAccounts::default());
        accounts.accounts.lock().unwrap().push(acct.clone());
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![
            Err(SynclineError::Provider { status: 400, message: "glitch".into() }),
            Ok(good_token(3600)),
        ]));
        let mgr = manager(Arc::clone(&accounts), endpoint, Provider::Marketplace);

        mgr.smart_refresh(acct.id).await.expect("smart refresh");
        assert_eq!(accounts.token_updates.lock().unwrap().len(), 1);
    }
}
