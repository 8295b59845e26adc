//! Provider credential loading
//!
//! Credentials come from environment variables; a missing variable is a
//! fatal configuration error at startup, never a silent fallback.
//!
//! ## Environment Variables
//! - `SYNCLINE_MARKETPLACE_CLIENT_ID`: Marketplace app client id
//! - `SYNCLINE_MARKETPLACE_CLIENT_SECRET`: Marketplace app client secret
//! - `SYNCLINE_MARKETPLACE_BASE_URL`: Marketplace API base URL (optional)
//! - `SYNCLINE_LEDGER_CLIENT_ID`: Ledger app client id
//! - `SYNCLINE_LEDGER_CLIENT_SECRET`: Ledger app client secret
//! - `SYNCLINE_LEDGER_BASE_URL`: Ledger API base URL (optional)

use syncline_domain::{Result, SynclineError};

const DEFAULT_MARKETPLACE_BASE_URL: &str = "https://api.mercadolibre.com";
const DEFAULT_LEDGER_BASE_URL: &str = "https://api.contaazul.com";

/// OAuth app credentials plus the API base URL for one provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub marketplace: ProviderCredentials,
    pub ledger: ProviderCredentials,
}

/// Load both providers' credentials from the environment.
///
/// # Errors
/// Returns `SynclineError::Config` naming the first missing variable.
pub fn load_credentials() -> Result<Credentials> {
    Ok(Credentials {
        marketplace: ProviderCredentials {
            client_id: env_var("SYNCLINE_MARKETPLACE_CLIENT_ID")?,
            client_secret: env_var("SYNCLINE_MARKETPLACE_CLIENT_SECRET")?,
            base_url: env_or("SYNCLINE_MARKETPLACE_BASE_URL", DEFAULT_MARKETPLACE_BASE_URL),
        },
        ledger: ProviderCredentials {
            client_id: env_var("SYNCLINE_LEDGER_CLIENT_ID")?,
            client_secret: env_var("SYNCLINE_LEDGER_CLIENT_SECRET")?,
            base_url: env_or("SYNCLINE_LEDGER_BASE_URL", DEFAULT_LEDGER_BASE_URL),
        },
    })
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| SynclineError::Config(format!("Missing required environment variable: {key}")))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
