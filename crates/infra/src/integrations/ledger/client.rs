//! Ledger REST client
//!
//! Payables and receivables share one wire shape; the entry kind picks the
//! path segment. The ledger throttles aggressively, so every call goes
//! through the retrying HTTP client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use syncline_core::LedgerApi;
use syncline_domain::{EntryKind, LedgerCategory, LedgerEntry, LedgerPaymentMethod, Result, SynclineError};
use tracing::debug;

use crate::errors::status_to_error;
use crate::http::HttpClient;

pub struct LedgerClient {
    http: HttpClient,
    base_url: String,
}

impl LedgerClient {
    pub fn new(http: HttpClient, base_url: String) -> Self {
        Self { http, base_url }
    }

    fn kind_path(kind: EntryKind) -> &'static str {
        match kind {
            EntryKind::Payable => "payables",
            EntryKind::Receivable => "receivables",
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(status_to_error(
            status.as_u16(),
            status.canonical_reason().unwrap_or("ledger"),
        ));
    }
    response
        .json::<T>()
        .await
        .map_err(|err| SynclineError::MalformedResponse(format!("ledger payload: {err}")))
}

#[async_trait]
impl LedgerApi for LedgerClient {
    async fn list_entries(
        &self,
        access_token: &str,
        kind: EntryKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>> {
        let url = format!("{}/v1/{}", self.base_url, Self::kind_path(kind));
        let request = self
            .http
            .request(Method::GET, &url)
            .bearer_auth(access_token)
            .query(&[
                ("due_date_from", from.format("%Y-%m-%d").to_string()),
                ("due_date_to", to.format("%Y-%m-%d").to_string()),
            ]);

        let response = self.http.send(request).await?;
        let entries: Vec<EntryDto> = read_json(response).await?;
        debug!(kind = kind.as_str(), count = entries.len(), "listed ledger entries");
        Ok(entries.into_iter().map(|dto| dto.into_domain(kind)).collect())
    }

    async fn entry_detail(
        &self,
        access_token: &str,
        kind: EntryKind,
        entry_id: &str,
    ) -> Result<LedgerEntry> {
        let url = format!("{}/v1/{}/{entry_id}", self.base_url, Self::kind_path(kind));
        let request = self.http.request(Method::GET, &url).bearer_auth(access_token);
        let response = self.http.send(request).await?;
        let dto: EntryDto = read_json(response).await?;
        Ok(dto.into_domain(kind))
    }

    async fn list_categories(&self, access_token: &str) -> Result<Vec<LedgerCategory>> {
        let url = format!("{}/v1/categories", self.base_url);
        let request = self.http.request(Method::GET, &url).bearer_auth(access_token);
        let response = self.http.send(request).await?;
        let categories: Vec<CategoryDto> = read_json(response).await?;
        Ok(categories.into_iter().map(CategoryDto::into_domain).collect())
    }

    async fn category_detail(
        &self,
        access_token: &str,
        category_id: &str,
    ) -> Result<LedgerCategory> {
        let url = format!("{}/v1/categories/{category_id}", self.base_url);
        let request = self.http.request(Method::GET, &url).bearer_auth(access_token);
        let response = self.http.send(request).await?;
        let dto: CategoryDto = read_json(response).await?;
        Ok(dto.into_domain())
    }

    async fn list_payment_methods(&self, access_token: &str) -> Result<Vec<LedgerPaymentMethod>> {
        let url = format!("{}/v1/payment-methods", self.base_url);
        let request = self.http.request(Method::GET, &url).bearer_auth(access_token);
        let response = self.http.send(request).await?;
        let methods: Vec<PaymentMethodDto> = read_json(response).await?;
        Ok(methods.into_iter().map(PaymentMethodDto::into_domain).collect())
    }

    async fn payment_method_detail(
        &self,
        access_token: &str,
        payment_method_id: &str,
    ) -> Result<LedgerPaymentMethod> {
        let url = format!("{}/v1/payment-methods/{payment_method_id}", self.base_url);
        let request = self.http.request(Method::GET, &url).bearer_auth(access_token);
        let response = self.http.send(request).await?;
        let dto: PaymentMethodDto = read_json(response).await?;
        Ok(dto.into_domain())
    }
}

/* ------------------------------ wire shapes ------------------------------ */

#[derive(Debug, Deserialize)]
struct EntryDto {
    id: String,
    description: String,
    #[serde(alias = "value")]
    amount: f64,
    due_date: DateTime<Utc>,
    status: String,
    category_id: Option<String>,
    payment_method_id: Option<String>,
}

impl EntryDto {
    fn into_domain(self, kind: EntryKind) -> LedgerEntry {
        LedgerEntry {
            external_id: self.id,
            kind,
            description: self.description,
            amount: self.amount,
            due_date: self.due_date,
            status: self.status,
            category_external_id: self.category_id,
            payment_method_external_id: self.payment_method_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CategoryDto {
    id: String,
    name: String,
}

impl CategoryDto {
    fn into_domain(self) -> LedgerCategory {
        LedgerCategory {
            external_id: self.id,
            name: self.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentMethodDto {
    id: String,
    name: String,
}

impl PaymentMethodDto {
    fn into_domain(self) -> LedgerPaymentMethod {
        LedgerPaymentMethod {
            external_id: self.id,
            name: self.name,
        }
    }
}
