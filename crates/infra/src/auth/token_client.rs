//! Provider token endpoint clients
//!
//! Both providers exchange a refresh token for a fresh token pair via
//! `POST grant_type=refresh_token`. The marketplace expects its app
//! credentials in the form body; the ledger expects them as HTTP Basic auth.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use syncline_core::TokenEndpoint;
use syncline_domain::{RefreshedToken, Result, SynclineError};
use tracing::debug;

use crate::config::ProviderCredentials;
use crate::errors::status_to_error;
use crate::http::HttpClient;

const MARKETPLACE_TOKEN_PATH: &str = "/oauth/token";
const LEDGER_TOKEN_PATH: &str = "/oauth2/token";

/// Error payload shape shared by both providers' token endpoints.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    #[serde(alias = "error_description", alias = "message")]
    description: Option<String>,
}

pub struct MarketplaceTokenClient {
    http: HttpClient,
    credentials: ProviderCredentials,
}

impl MarketplaceTokenClient {
    pub fn new(http: HttpClient, credentials: ProviderCredentials) -> Self {
        Self { http, credentials }
    }
}

#[async_trait]
impl TokenEndpoint for MarketplaceTokenClient {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken> {
        let url = format!("{}{}", self.credentials.base_url, MARKETPLACE_TOKEN_PATH);
        debug!(endpoint = "marketplace", "refreshing token");

        let request = self.http.request(Method::POST, &url).form(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ]);

        let response = self.http.send(request).await?;
        parse_token_response(response).await
    }
}

pub struct LedgerTokenClient {
    http: HttpClient,
    credentials: ProviderCredentials,
}

impl LedgerTokenClient {
    pub fn new(http: HttpClient, credentials: ProviderCredentials) -> Self {
        Self { http, credentials }
    }
}

#[async_trait]
impl TokenEndpoint for LedgerTokenClient {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken> {
        let url = format!("{}{}", self.credentials.base_url, LEDGER_TOKEN_PATH);
        debug!(endpoint = "ledger", "refreshing token");

        let request = self
            .http
            .request(Method::POST, &url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)]);

        let response = self.http.send(request).await?;
        parse_token_response(response).await
    }
}

/// Map the token endpoint response into the domain taxonomy. A 400 carrying
/// `invalid_grant` means the refresh token itself is dead.
async fn parse_token_response(response: reqwest::Response) -> Result<RefreshedToken> {
    let status = response.status();

    if status.is_success() {
        return response
            .json::<RefreshedToken>()
            .await
            .map_err(|err| SynclineError::MalformedResponse(format!("token payload: {err}")));
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: Option<TokenErrorBody> = serde_json::from_str(&body).ok();
    let error_code = parsed.as_ref().and_then(|b| b.error.as_deref()).unwrap_or_default();

    if status.as_u16() == 400 && error_code == "invalid_grant" {
        let detail = parsed
            .and_then(|b| b.description)
            .unwrap_or_else(|| "refresh token rejected".to_string());
        return Err(SynclineError::InvalidGrant(detail));
    }

    Err(status_to_error(status.as_u16(), status.canonical_reason().unwrap_or("token endpoint")))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn credentials(base_url: String) -> ProviderCredentials {
        ProviderCredentials {
            client_id: "app-id".into(),
            client_secret: "app-secret".into(),
            base_url,
        }
    }

    fn http() -> HttpClient {
        HttpClient::builder()
            .max_attempts(1)
            .build()
            .expect("http client")
    }

    #[tokio::test]
    async fn marketplace_refresh_sends_credentials_in_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("client_id=app-id"))
            .and(body_string_contains("client_secret=app-secret"))
            .and(body_string_contains("refresh_token=rt-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-2",
                "refresh_token": "rt-2",
                "expires_in": 21600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MarketplaceTokenClient::new(http(), credentials(server.uri()));
        let token = client.refresh("rt-1").await.expect("token");
        assert_eq!(token.access_token, "at-2");
        assert_eq!(token.refresh_token.as_deref(), Some("rt-2"));
        assert_eq!(token.expires_in, 21600);
    }

    #[tokio::test]
    async fn ledger_refresh_uses_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-9",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LedgerTokenClient::new(http(), credentials(server.uri()));
        let token = client.refresh("rt-9").await.expect("token");
        assert_eq!(token.access_token, "at-9");
        // Provider may omit the rotated refresh token.
        assert!(token.refresh_token.is_none());
    }

    #[tokio::test]
    async fn invalid_grant_is_classified_from_the_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "refresh token revoked by user"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MarketplaceTokenClient::new(http(), credentials(server.uri()));
        let err = client.refresh("rt-dead").await.unwrap_err();
        match err {
            SynclineError::InvalidGrant(detail) => assert!(detail.contains("revoked")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_bad_request_is_not_invalid_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_request"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MarketplaceTokenClient::new(http(), credentials(server.uri()));
        let err = client.refresh("rt-1").await.unwrap_err();
        assert!(matches!(err, SynclineError::Provider { status: 400, .. }));
    }

    #[tokio::test]
    async fn malformed_success_payload_is_flagged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let client = MarketplaceTokenClient::new(http(), credentials(server.uri()));
        let err = client.refresh("rt-1").await.unwrap_err();
        assert!(matches!(err, SynclineError::MalformedResponse(_)));
    }
}
