//! Accounting-platform records (payables, receivables, categories)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the ledger an entry lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Payable,
    Receivable,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payable => "payable",
            Self::Receivable => "receivable",
        }
    }
}

/// Payable or receivable entry, normalized to the fields the engine
/// reads/writes. Missing category is never fatal; the record persists with
/// `category_external_id = None` and is eligible for backfill later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub external_id: String,
    pub kind: EntryKind,
    pub description: String,
    pub amount: f64,
    pub due_date: DateTime<Utc>,
    pub status: String,
    pub category_external_id: Option<String>,
    pub payment_method_external_id: Option<String>,
}

/// Category on the accounting platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerCategory {
    pub external_id: String,
    pub name: String,
}

/// Payment method on the accounting platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerPaymentMethod {
    pub external_id: String,
    pub name: String,
}
