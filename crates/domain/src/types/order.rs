//! Marketplace order records, normalized to the fields the engine reads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of a marketplace order search.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPage {
    pub results: Vec<MarketplaceOrder>,
    /// Total matches the provider reports for the whole query.
    pub paging_total: u64,
}

/// List-level order entry, enriched in place by the detail resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceOrder {
    pub external_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub total_amount: f64,
    pub unit_price: f64,
    pub quantity: u32,
    /// Order-level shipping cost; lowest-priority charged-cost source.
    pub shipping_cost: Option<f64>,
    pub shipment_id: Option<String>,
    /// Attached by the detail resolver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment: Option<OrderShipment>,
}

/// Shipment detail for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderShipment {
    pub external_id: String,
    pub logistic_type: String,
    pub base_cost: Option<f64>,
    pub list_cost: Option<f64>,
    pub shipment_cost: Option<f64>,
    pub shipping_option: Option<ShippingOption>,
}

/// Shipping option chosen for a shipment; its cost takes priority when
/// selecting the charged cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingOption {
    pub cost: Option<f64>,
    pub list_cost: Option<f64>,
}
