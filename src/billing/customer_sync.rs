//! Customer identity sync: one external billing customer per local user,
//! created on first need and pushed on every profile change.
//!
//! This runs as a post-commit side effect of a user write. It must never
//! fail the write itself: every failure here is logged and the next update
//! retries. The "already has an identifier" guard is not atomic under
//! concurrent updates; duplicate creation is possible and accepted.

use std::sync::Arc;

use serde_json::json;

use crate::db::{DocumentStore, collections};
use crate::models::User;
use crate::stripe::StripeClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyncPlan {
    create_customer: bool,
    push_fields: bool,
}

fn plan(user: &User, operation: WriteOperation) -> SyncPlan {
    SyncPlan {
        create_customer: user.uid.is_some() && user.stripe_customer_id.is_none(),
        push_fields: operation == WriteOperation::Update && user.stripe_customer_id.is_some(),
    }
}

/// Post-commit hook: spawn the sync without blocking the caller's write.
pub fn on_user_persisted(
    store: Arc<dyn DocumentStore>,
    stripe: Arc<StripeClient>,
    user: User,
    operation: WriteOperation,
) {
    tokio::spawn(async move {
        sync_user(store.as_ref(), &stripe, &user, operation).await;
    });
}

/// Ensure exactly one external customer record exists for the user and
/// reflects current profile fields. Best-effort: failures are logged only.
pub async fn sync_user(
    store: &dyn DocumentStore,
    stripe: &StripeClient,
    user: &User,
    operation: WriteOperation,
) {
    let plan = plan(user, operation);

    if plan.create_customer {
        match stripe.create_customer(user).await {
            Ok(customer) => {
                // The identifier is set exactly once and never cleared.
                if let Err(e) = store
                    .update(
                        collections::USERS,
                        &user.id,
                        json!({ "stripeCustomerId": customer.id }),
                    )
                    .await
                {
                    tracing::error!(
                        user_id = %user.id,
                        customer_id = %customer.id,
                        "Failed to persist Stripe customer id: {}",
                        e
                    );
                } else {
                    tracing::info!(
                        user_id = %user.id,
                        customer_id = %customer.id,
                        "Created Stripe customer"
                    );
                }
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, "Error creating Stripe customer: {}", e);
            }
        }
    }

    if plan.push_fields {
        // Full overwrite of customer fields, not a diff.
        let customer_id = match &user.stripe_customer_id {
            Some(id) => id,
            None => return,
        };
        if let Err(e) = stripe.update_customer(customer_id, user).await {
            tracing::error!(
                user_id = %user.id,
                customer_id = %customer_id,
                "Error updating Stripe customer: {}",
                e
            );
        }
    }
}
