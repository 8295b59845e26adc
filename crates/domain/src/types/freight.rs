//! Freight adjustment types
//!
//! The policy evaluation itself lives in `syncline-core`; these are the
//! shapes it consumes and produces.

use serde::{Deserialize, Serialize};

/// Logistics modality of a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogisticType {
    SelfService,
    DropOff,
    XdDropOff,
    Fulfillment,
    CrossDocking,
    /// Anything the policy table has no rule for.
    #[serde(untagged)]
    Other(String),
}

impl LogisticType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "self_service" => Self::SelfService,
            "drop_off" => Self::DropOff,
            "xd_drop_off" => Self::XdDropOff,
            "fulfillment" => Self::Fulfillment,
            "cross_docking" => Self::CrossDocking,
            other => Self::Other(other.to_string()),
        }
    }

    /// Human-readable label shown to users.
    pub fn label(&self) -> &str {
        match self {
            Self::SelfService => "FLEX",
            Self::DropOff => "Correios",
            Self::XdDropOff => "Agência",
            Self::Fulfillment => "FULL",
            Self::CrossDocking => "Coleta",
            Self::Other(raw) => raw,
        }
    }
}

/// Cost fields the freight policy evaluates, taken from an order and its
/// shipment detail.
#[derive(Debug, Clone, PartialEq)]
pub struct FreightInput {
    pub logistic_type: LogisticType,
    pub unit_price: f64,
    pub quantity: u32,
    pub base_cost: f64,
    pub list_cost: f64,
    /// Shipping-option cost, when the shipment carries one.
    pub shipping_option_cost: Option<f64>,
    /// Shipment-level cost.
    pub shipment_cost: Option<f64>,
    /// Order-level shipping cost; last resort.
    pub order_shipping_cost: Option<f64>,
}

/// Which field supplied the charged cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargedCostSource {
    ShippingOption,
    Shipment,
    OrderShipping,
    None,
}

/// Which policy branch produced the adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentRule {
    /// self_service with base and list cost cancelling out: flat tier charge.
    FlexFlat,
    /// self_service with a real base/list difference.
    FlexDifference,
    /// drop_off / xd_drop_off / fulfillment / cross_docking at or above the
    /// price tier: list minus charged.
    ListMinusCharged,
    /// Below the price tier outside self_service: no charge.
    BelowTier,
}

/// Computed freight figures; derived, never authoritative source data.
///
/// `adjusted_cost` is `None` when the policy table has no rule for the
/// observed inputs; callers fall back to the unadjusted charged cost and
/// must never fabricate a zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFreight {
    pub logistic_type: LogisticType,
    pub base_cost: f64,
    pub list_cost: f64,
    pub charged_cost: f64,
    pub charged_cost_source: ChargedCostSource,
    pub adjusted_cost: Option<f64>,
    pub adjustment_rule: Option<AdjustmentRule>,
}
