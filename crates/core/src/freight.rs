//! Freight adjustment policy
//!
//! Derives the effective freight cost for a marketplace order from shipment
//! figures. The charged cost is picked from the first non-zero source in
//! priority order, then a per-logistics-mode rule produces the adjustment.

use syncline_domain::{
    AdjustmentRule, ChargedCostSource, DerivedFreight, FreightInput, LogisticType,
    FLEX_CHARGE_ABOVE_TIER, FLEX_CHARGE_BELOW_TIER, FREIGHT_PRICE_TIER,
};

/// Compute the derived freight figures for one order.
pub fn derive_freight(input: &FreightInput) -> DerivedFreight {
    let (charged_cost, charged_cost_source) = pick_charged_cost(input);
    let (adjusted_cost, adjustment_rule) = adjust(input, charged_cost);

    DerivedFreight {
        logistic_type: input.logistic_type.clone(),
        base_cost: input.base_cost,
        list_cost: input.list_cost,
        charged_cost,
        charged_cost_source,
        adjusted_cost,
        adjustment_rule,
    }
}

/// Priority: shipping option cost, then shipment cost, then the order-level
/// shipping cost. Zero values are treated as absent for the first two tiers.
fn pick_charged_cost(input: &FreightInput) -> (f64, ChargedCostSource) {
    if let Some(cost) = input.shipping_option_cost {
        if cost != 0.0 {
            return (cost, ChargedCostSource::ShippingOption);
        }
    }
    if let Some(cost) = input.shipment_cost {
        if cost != 0.0 {
            return (cost, ChargedCostSource::Shipment);
        }
    }
    if let Some(cost) = input.order_shipping_cost {
        return (cost, ChargedCostSource::OrderShipping);
    }
    (0.0, ChargedCostSource::None)
}

fn adjust(input: &FreightInput, charged_cost: f64) -> (Option<f64>, Option<AdjustmentRule>) {
    let below_tier = input.unit_price < FREIGHT_PRICE_TIER;

    match input.logistic_type {
        LogisticType::SelfService => {
            let diff = round2(input.base_cost - input.list_cost);
            if diff == 0.0 {
                let flat = if below_tier {
                    FLEX_CHARGE_BELOW_TIER
                } else {
                    FLEX_CHARGE_ABOVE_TIER
                };
                (Some(flat), Some(AdjustmentRule::FlexFlat))
            } else {
                (Some(diff), Some(AdjustmentRule::FlexDifference))
            }
        }
        LogisticType::DropOff
        | LogisticType::XdDropOff
        | LogisticType::Fulfillment
        | LogisticType::CrossDocking
            if !below_tier =>
        {
            let cost = round2(-(input.list_cost - charged_cost));
            (Some(cost), Some(AdjustmentRule::ListMinusCharged))
        }
        _ if below_tier => (Some(0.0), Some(AdjustmentRule::BelowTier)),
        _ => (None, None),
    }
}

/// Round half away from zero to two decimal places, normalizing negative zero.
fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
