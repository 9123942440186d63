//! Price mirror: lazily copies provider-defined prices for a product into
//! local storage so reads can join them without a remote call.

use futures::future::try_join_all;
use serde_json::{Value, json};

use crate::db::{DocumentStore, Filter, collections, upsert};
use crate::error::Result;
use crate::models::PriceRef;
use crate::stripe::{self, StripeClient};

const EXTERNAL_PRODUCT_PREFIX: &str = "prod_";

/// First page only. Products with more prices than this are a documented
/// limitation of the mirror; do not add pagination without confirming
/// intent.
const PRICE_PAGE_LIMIT: u32 = 100;

pub fn is_external_product_id(id: &str) -> bool {
    id.starts_with(EXTERNAL_PRODUCT_PREFIX)
}

/// Guarantee that every provider price for the product exists locally and
/// rewrite the product's price list: previously-existing docs first in
/// their original order, then newly-created docs in provider response
/// order. Idempotent per external price id.
///
/// Runs as a before-write hook on product documents; a `data` without a
/// matching external id is left untouched.
pub async fn populate_product_prices(
    store: &dyn DocumentStore,
    stripe: &StripeClient,
    data: &mut Value,
) -> Result<()> {
    let stripe_id = match data.get("stripeID").and_then(Value::as_str) {
        Some(id) if is_external_product_id(id) => id.to_string(),
        _ => return Ok(()),
    };

    let provider_prices = stripe.list_prices(&stripe_id, PRICE_PAGE_LIMIT).await?;
    let provider_ids: Vec<Value> = provider_prices.iter().map(|p| json!(p.id)).collect();

    let existing = store
        .find(
            collections::PRICES,
            &Filter::any_in("stripeID", provider_ids),
            None,
        )
        .await?;
    let existing_ids: std::collections::HashSet<&str> = existing
        .iter()
        .filter_map(|doc| doc.get("stripeID").and_then(Value::as_str))
        .collect();

    let missing: Vec<&stripe::Price> = provider_prices
        .iter()
        .filter(|p| !existing_ids.contains(p.id.as_str()))
        .collect();

    let created = try_join_all(
        missing
            .iter()
            .map(|price| ensure_price_exists(store, price)),
    )
    .await?;

    let refs: Vec<PriceRef> = existing
        .iter()
        .chain(created.iter())
        .filter_map(|doc| doc.get("id").and_then(Value::as_str))
        .map(|id| PriceRef {
            price: id.to_string(),
        })
        .collect();
    data["prices"] = serde_json::to_value(refs)?;

    Ok(())
}

/// Create the local mirror document for one provider price, at most once
/// per external id. The unique index on `stripeID` closes the race the
/// find-then-create upsert leaves open.
async fn ensure_price_exists(store: &dyn DocumentStore, price: &stripe::Price) -> Result<Value> {
    let product_id = price
        .product
        .as_ref()
        .map(|p| p.id(|obj| obj.id.as_str()).to_string())
        .unwrap_or_default();

    let mut data = json!({
        "stripeID": price.id,
        "stripeProductId": product_id,
        "unitAmount": price.unit_amount,
        "currency": price.currency,
        "type": price.price_type,
        "active": price.active,
    });
    if let Some(recurring) = &price.recurring {
        data["interval"] = json!(recurring.interval);
        data["intervalCount"] = json!(recurring.interval_count.unwrap_or(1));
        if let Some(trial) = recurring.trial_period_days {
            data["trialPeriodDays"] = json!(trial);
        }
    }

    resolve_product_link(store, &mut data).await?;

    upsert(
        store,
        collections::PRICES,
        &Filter::eq("stripeID", price.id.as_str()),
        data,
    )
    .await
}

/// Reverse link: when a price carries an external product id matching the
/// strict pattern, point its local `product` reference at the product
/// whose external id equals it. No-op when no such product exists.
pub async fn resolve_product_link(store: &dyn DocumentStore, data: &mut Value) -> Result<()> {
    let product_stripe_id = match data.get("stripeProductId").and_then(Value::as_str) {
        Some(id) if is_external_product_id(id) => id.to_string(),
        _ => return Ok(()),
    };

    let products = store
        .find(
            collections::PRODUCTS,
            &Filter::eq("stripeID", product_stripe_id),
            Some(1),
        )
        .await?;

    if let Some(id) = products.first().and_then(|doc| doc.get("id")).cloned() {
        data["product"] = id;
    }

    Ok(())
}
