use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureItem {
    pub title: String,
}

/// Ordered reference to a mirrored price document. Insertion order is
/// display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRef {
    pub price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub features: Vec<FeatureItem>,
    #[serde(default)]
    pub prices: Vec<PriceRef>,
    /// External product identifier (`prod_…`).
    #[serde(rename = "stripeID", default)]
    pub stripe_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub features: Vec<FeatureItem>,
    #[serde(rename = "stripeID")]
    pub stripe_id: String,
}

fn default_active() -> bool {
    true
}
