//! Sync run bookkeeping: summaries, reports, progress events

use serde::{Deserialize, Serialize};

use crate::types::account::AccountId;

/// Orchestrator state per (account, entity type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Init,
    TokenReady,
    Ranging,
    Fetching,
    Resolving,
    Persisting,
    Done,
    Failed,
}

/// Structured outcome of one sync run. Partial success is the expected,
/// first-class shape: per-record and per-window failures land in `errors`
/// while `synced` keeps counting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub synced: u64,
    pub total: u64,
    pub errors: Vec<String>,
    pub phase: SyncPhase,
}

impl SyncSummary {
    pub fn new() -> Self {
        Self { synced: 0, total: 0, errors: Vec::new(), phase: SyncPhase::Init }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

impl Default for SyncSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a token maintenance pass over all accounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Accounts whose tokens are valid after the pass.
    pub success: Vec<AccountId>,
    /// Accounts that still lack a valid token.
    pub failed: Vec<AccountId>,
    /// Previously quarantined accounts that recovered during the pass.
    pub recovered: Vec<AccountId>,
}

/// Progress event emitted at well-defined checkpoints (range computed, page
/// fetched, batch persisted). Delivery transport is an external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Start { message: String },
    Progress { message: String, value: u64, max: u64 },
    Complete { message: String },
    Error { message: String },
}
