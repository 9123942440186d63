use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PricingType {
    OneTime,
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlanInterval {
    Day,
    Week,
    Month,
    Year,
}

/// Local mirror of one provider price. Immutable once created except for
/// `active` and the derived `product` link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub id: String,
    /// External price identifier; globally unique, the idempotency key
    /// for mirroring.
    #[serde(rename = "stripeID")]
    pub stripe_id: String,
    /// External product identifier (join key, resolved asynchronously).
    pub stripe_product_id: String,
    /// Local product reference, populated by the mirror's reverse link.
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    pub currency: String,
    #[serde(rename = "type")]
    pub pricing_type: PricingType,
    #[serde(default)]
    pub interval: Option<PlanInterval>,
    #[serde(default)]
    pub interval_count: Option<i64>,
    #[serde(default)]
    pub trial_period_days: Option<i64>,
    #[serde(default)]
    pub active: bool,
}

/// Input for the catalog price-create flow: the provider price is created
/// first, then mirrored locally with the returned id.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePriceInput {
    pub stripe_product_id: String,
    pub unit_amount: i64,
    pub currency: String,
    #[serde(rename = "type")]
    pub pricing_type: PricingType,
    #[serde(default)]
    pub interval: Option<PlanInterval>,
    #[serde(default)]
    pub interval_count: Option<i64>,
    #[serde(default)]
    pub trial_period_days: Option<i64>,
}
