use axum::{
    Json,
    extract::{Extension, State},
};
use serde::Serialize;

use crate::billing::reconciler::{SubscriptionView, resolve_active_subscription};
use crate::db::AppState;
use crate::error::Result;
use crate::models::User;
use crate::stripe::PaymentMethod;

/// Card summary for display; non-card payment methods keep only the type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodView {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp_month: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp_year: Option<i64>,
}

impl From<PaymentMethod> for PaymentMethodView {
    fn from(method: PaymentMethod) -> Self {
        let card = method.card;
        Self {
            id: method.id,
            method_type: method.method_type,
            brand: card
                .as_ref()
                .and_then(|c| c.display_brand.clone().or_else(|| c.brand.clone())),
            last4: card.as_ref().and_then(|c| c.last4.clone()),
            exp_month: card.as_ref().and_then(|c| c.exp_month),
            exp_year: card.as_ref().and_then(|c| c.exp_year),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOverview {
    pub subscription: SubscriptionView,
    pub payment_methods: Vec<PaymentMethodView>,
}

pub async fn subscription_overview(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<SubscriptionOverview>> {
    let subscription =
        resolve_active_subscription(state.store.as_ref(), &state.stripe, &user).await?;

    // Payment methods are decorative here; a provider failure degrades to
    // an empty list rather than failing the whole overview.
    let payment_methods = match &user.stripe_customer_id {
        Some(customer_id) => match state.stripe.list_payment_methods(customer_id).await {
            Ok(methods) => methods.into_iter().map(PaymentMethodView::from).collect(),
            Err(e) => {
                tracing::warn!(customer_id = %customer_id, "Payment method fetch failed: {}", e);
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    Ok(Json(SubscriptionOverview {
        subscription,
        payment_methods,
    }))
}
