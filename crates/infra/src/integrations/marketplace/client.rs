//! Marketplace REST client
//!
//! Thin wire layer over the order search, order detail and shipment detail
//! endpoints. Wire payloads are normalized into the domain shapes here so
//! nothing upstream sees provider field names.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use syncline_core::MarketplaceApi;
use syncline_domain::{
    MarketplaceOrder, OrderPage, OrderShipment, Result, ShippingOption, SynclineError,
};
use tracing::debug;

use crate::errors::status_to_error;
use crate::http::HttpClient;

pub struct MarketplaceClient {
    http: HttpClient,
    base_url: String,
}

impl MarketplaceClient {
    pub fn new(http: HttpClient, base_url: String) -> Self {
        Self { http, base_url }
    }

    async fn search(
        &self,
        access_token: &str,
        seller_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u64,
        offset: u64,
    ) -> Result<SearchResponse> {
        let url = format!("{}/orders/search", self.base_url);
        let request = self
            .http
            .request(Method::GET, &url)
            .bearer_auth(access_token)
            .query(&[
                ("seller", seller_id.to_string()),
                ("order.date_created.from", rfc3339_millis(from)),
                ("order.date_created.to", rfc3339_millis(to)),
                ("sort", "date_desc".to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ]);

        let response = self.http.send(request).await?;
        read_json(response).await
    }
}

fn rfc3339_millis(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(status_to_error(
            status.as_u16(),
            status.canonical_reason().unwrap_or("marketplace"),
        ));
    }
    response
        .json::<T>()
        .await
        .map_err(|err| SynclineError::MalformedResponse(format!("marketplace payload: {err}")))
}

#[async_trait]
impl MarketplaceApi for MarketplaceClient {
    async fn count_orders(
        &self,
        access_token: &str,
        seller_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64> {
        // Page size 1: only the paging total is read.
        let page = self.search(access_token, seller_id, from, to, 1, 0).await?;
        debug!(seller_id, total = page.paging.total, "counted orders in range");
        Ok(page.paging.total)
    }

    async fn search_orders(
        &self,
        access_token: &str,
        seller_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u64,
        offset: u64,
    ) -> Result<OrderPage> {
        let page = self.search(access_token, seller_id, from, to, limit, offset).await?;
        Ok(OrderPage {
            results: page.results.into_iter().map(OrderDto::into_domain).collect(),
            paging_total: page.paging.total,
        })
    }

    async fn order_detail(&self, access_token: &str, order_id: &str) -> Result<MarketplaceOrder> {
        let url = format!("{}/orders/{order_id}", self.base_url);
        let request = self.http.request(Method::GET, &url).bearer_auth(access_token);
        let response = self.http.send(request).await?;
        let dto: OrderDto = read_json(response).await?;
        Ok(dto.into_domain())
    }

    async fn shipment_detail(
        &self,
        access_token: &str,
        shipment_id: &str,
    ) -> Result<OrderShipment> {
        let url = format!("{}/shipments/{shipment_id}", self.base_url);
        let request = self.http.request(Method::GET, &url).bearer_auth(access_token);
        let response = self.http.send(request).await?;
        let dto: ShipmentDto = read_json(response).await?;
        Ok(dto.into_domain())
    }
}

/* ------------------------------ wire shapes ------------------------------ */

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<OrderDto>,
    paging: PagingDto,
}

#[derive(Debug, Deserialize)]
struct PagingDto {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct OrderDto {
    id: u64,
    status: String,
    date_created: DateTime<Utc>,
    total_amount: f64,
    #[serde(default)]
    order_items: Vec<OrderItemDto>,
    shipping: Option<ShippingRefDto>,
}

#[derive(Debug, Deserialize)]
struct OrderItemDto {
    unit_price: f64,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct ShippingRefDto {
    id: Option<u64>,
    cost: Option<f64>,
}

impl OrderDto {
    fn into_domain(self) -> MarketplaceOrder {
        let unit_price = self.order_items.first().map(|i| i.unit_price).unwrap_or(0.0);
        let quantity = self.order_items.iter().map(|i| i.quantity).sum();
        MarketplaceOrder {
            external_id: self.id.to_string(),
            status: self.status,
            created_at: self.date_created,
            total_amount: self.total_amount,
            unit_price,
            quantity,
            shipping_cost: self.shipping.as_ref().and_then(|s| s.cost),
            shipment_id: self.shipping.and_then(|s| s.id).map(|id| id.to_string()),
            shipment: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ShipmentDto {
    id: u64,
    logistic_type: String,
    base_cost: Option<f64>,
    list_cost: Option<f64>,
    order_cost: Option<f64>,
    shipping_option: Option<ShippingOptionDto>,
}

#[derive(Debug, Deserialize)]
struct ShippingOptionDto {
    cost: Option<f64>,
    list_cost: Option<f64>,
}

impl ShipmentDto {
    fn into_domain(self) -> OrderShipment {
        OrderShipment {
            external_id: self.id.to_string(),
            logistic_type: self.logistic_type,
            base_cost: self.base_cost,
            // Top-level list cost, else the shipping option's.
            list_cost: self
                .list_cost
                .or_else(|| self.shipping_option.as_ref().and_then(|o| o.list_cost)),
            shipment_cost: self.order_cost,
            shipping_option: self.shipping_option.map(|o| ShippingOption {
                cost: o.cost,
                list_cost: o.list_cost,
            }),
        }
    }
}
