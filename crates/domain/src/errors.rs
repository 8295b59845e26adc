//! Error types used throughout the sync engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for syncline
///
/// Variants follow the engine's error taxonomy: rate limiting and transient
/// server errors are retryable, invalid-grant failures feed the quarantine
/// counter, malformed payloads skip a record without aborting the batch, and
/// configuration errors are fatal at the top level.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SynclineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Refresh token rejected: {0}")]
    InvalidGrant(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Provider error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SynclineError {
    /// Provider-reported HTTP status, when one exists.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            Self::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    /// True for transient server-side failures (5xx).
    pub fn is_transient_server(&self) -> bool {
        matches!(self, Self::Provider { status, .. } if (500..600).contains(status))
    }
}

/// Result type alias for syncline operations
pub type Result<T> = std::result::Result<T, SynclineError>;
