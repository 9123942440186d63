use axum::{
    Json,
    extract::{Extension, State},
};
use serde_json::{Value, json};

use crate::billing::payments::list_payments;
use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::models::User;

pub async fn payment_history(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>> {
    let payments = list_payments(&state.stripe, &user).await.map_err(|e| {
        tracing::error!(user_id = %user.id, "Failed to fetch payment history: {}", e);
        AppError::Internal("Failed to fetch payment history".into())
    })?;
    Ok(Json(json!({ "payments": payments })))
}
