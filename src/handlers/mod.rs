mod catalog;
mod checkout;
mod payments;
mod profile;
mod session;
mod subscription;

pub use catalog::*;
pub use checkout::*;
pub use payments::*;
pub use profile::*;
pub use session::*;
pub use subscription::*;

use axum::{
    Json, Router, middleware,
    routing::{get, patch, post},
};
use serde_json::{Value, json};

use crate::db::AppState;
use crate::middleware::require_user;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/payments", get(payment_history))
        .route("/subscription", get(subscription_overview))
        .route("/subscription-success", get(subscription_success))
        .route("/profile", patch(update_profile))
        .route("/products", post(upsert_product))
        .route("/prices", post(create_price))
        .layer(middleware::from_fn_with_state(state.clone(), require_user));

    Router::new()
        .route("/health", get(health))
        .route("/refresh-token", post(refresh_token))
        .nest("/api", authed)
        .with_state(state)
}
