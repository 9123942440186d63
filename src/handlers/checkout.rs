use axum::{
    Json,
    extract::{Extension, Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::billing::checkout::{CheckoutRedirects, CheckoutResult, issue_checkout};
use crate::billing::confirmation::{CheckoutConfirmation, confirm_checkout};
use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::models::User;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSession {
    #[serde(default)]
    pub price_id: Option<String>,
    /// Nested `{ "redirects": { "success", "cancel" } }` object.
    #[serde(default)]
    pub redirects: CheckoutRedirects,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<CreateCheckoutSession>,
) -> Result<Json<Value>> {
    let customer_id = user
        .stripe_customer_id
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("No Stripe customer ID found".into()))?;

    let price_id = input.price_id.unwrap_or_default();
    match issue_checkout(
        &state.stripe,
        &price_id,
        customer_id,
        &input.redirects,
        &state.site_url,
    )
    .await
    {
        CheckoutResult::Created { session_id } => Ok(Json(json!({ "sessionId": session_id }))),
        CheckoutResult::Failed { error } => Err(AppError::BadRequest(error)),
    }
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn subscription_success(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<CheckoutConfirmation>> {
    let session_id = query
        .session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing session_id".into()))?;

    let confirmation = confirm_checkout(&state.stripe, &user, &session_id).await?;
    Ok(Json(confirmation))
}
