use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::billing::price_mirror::{
    is_external_product_id, populate_product_prices, resolve_product_link,
};
use crate::db::{AppState, Filter, collections, upsert};
use crate::error::{AppError, Result};
use crate::models::{CreatePriceInput, Price, UpsertProduct};

/// Upsert a product keyed by its external id, mirroring the provider's
/// prices for it before the write so the stored document already carries
/// its price references.
pub async fn upsert_product(
    State(state): State<AppState>,
    Json(input): Json<UpsertProduct>,
) -> Result<Json<Value>> {
    let mut data = json!({
        "name": input.name,
        "description": input.description,
        "active": input.active,
        "features": input.features,
        "stripeID": input.stripe_id,
    });

    populate_product_prices(state.store.as_ref(), &state.stripe, &mut data).await?;

    let doc = upsert(
        state.store.as_ref(),
        collections::PRODUCTS,
        &Filter::eq("stripeID", input.stripe_id.as_str()),
        data,
    )
    .await?;

    Ok(Json(doc))
}

/// Create a price at the provider first, then mirror it locally under the
/// returned external id.
pub async fn create_price(
    State(state): State<AppState>,
    Json(input): Json<CreatePriceInput>,
) -> Result<Json<Price>> {
    if !is_external_product_id(&input.stripe_product_id) {
        return Err(AppError::BadRequest(
            "stripeProductId must be an external product id".into(),
        ));
    }

    let price = state.stripe.create_price(&input).await?;

    let mut data = json!({
        "stripeID": price.id,
        "stripeProductId": input.stripe_product_id,
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

    resolve_product_link(state.store.as_ref(), &mut data).await?;

    let doc = upsert(
        state.store.as_ref(),
        collections::PRICES,
        &Filter::eq("stripeID", price.id.as_str()),
        data,
    )
    .await?;

    let mirrored: Price = serde_json::from_value(doc)?;
    Ok(Json(mirrored))
}
