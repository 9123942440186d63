use axum::{
    Json,
    extract::{Extension, State},
};
use serde_json::{Map, Value, json};

use crate::billing::customer_sync::{WriteOperation, on_user_persisted};
use crate::db::{AppState, collections};
use crate::error::{AppError, Result};
use crate::models::{UpdateProfile, User};

/// Patch the caller's own profile. The customer sync runs post-commit and
/// never blocks or fails the response.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<UpdateProfile>,
) -> Result<Json<Value>> {
    let mut patch = Map::new();
    if let Some(name) = input.name {
        patch.insert("name".into(), json!(name));
    }
    if let Some(company_name) = input.company_name {
        patch.insert("companyName".into(), json!(company_name));
    }
    if let Some(phone) = input.phone {
        patch.insert("phone".into(), json!(phone));
    }
    if let Some(address) = input.address {
        patch.insert("address".into(), json!(address));
    }
    if patch.is_empty() {
        return Err(AppError::BadRequest("No profile fields to update".into()));
    }

    let updated = state
        .store
        .update(collections::USERS, &user.id, Value::Object(patch))
        .await?;

    if let Ok(updated_user) = serde_json::from_value::<User>(updated.clone()) {
        on_user_persisted(
            state.store.clone(),
            state.stripe.clone(),
            updated_user,
            WriteOperation::Update,
        );
    }

    Ok(Json(updated))
}
