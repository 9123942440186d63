//! Post-checkout confirmation: a lighter read of the reconciler used by
//! the success page, driven entirely by the provider-retrieved session.

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::User;
use crate::stripe::StripeClient;
use crate::util::{DateValue, format_long_date};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutConfirmation {
    pub customer_name: Option<String>,
    /// Present only when the session produced a subscription.
    pub product_name: Option<String>,
    pub price_amount: Option<String>,
    pub price_currency: Option<String>,
    pub billing_cycle: Option<String>,
    pub start_date: Option<String>,
    pub next_billing_date: Option<String>,
    pub invoice_url: Option<String>,
}

/// Retrieve the checkout session with its customer, invoice and
/// subscription expanded, and reject sessions that belong to a different
/// customer than the authenticated user.
pub async fn confirm_checkout(
    stripe: &StripeClient,
    user: &User,
    session_id: &str,
) -> Result<CheckoutConfirmation> {
    let session = stripe
        .retrieve_checkout_session(session_id, &["customer", "invoice", "subscription"])
        .await?;

    let session_customer_id = session
        .customer
        .as_ref()
        .map(|c| c.id(|obj| obj.id.as_str()).to_string());
    if session_customer_id.as_deref() != user.stripe_customer_id.as_deref()
        || session_customer_id.is_none()
    {
        return Err(AppError::Forbidden(
            "You are not allowed to view this session".to_string(),
        ));
    }

    let customer_name = session
        .customer
        .as_ref()
        .and_then(|c| c.as_object())
        .and_then(|c| c.name.clone().or_else(|| c.email.clone()));

    let invoice_url = session
        .invoice
        .as_ref()
        .and_then(|i| i.as_object())
        .and_then(|i| i.hosted_invoice_url.clone());

    let mut confirmation = CheckoutConfirmation {
        customer_name,
        product_name: None,
        price_amount: None,
        price_currency: None,
        billing_cycle: None,
        start_date: None,
        next_billing_date: None,
        invoice_url,
    };

    let Some(subscription) = session.subscription.as_ref().and_then(|s| s.as_object()) else {
        return Ok(confirmation);
    };
    let Some(item) = subscription.items.data.first() else {
        return Ok(confirmation);
    };

    let product_ids: Vec<String> = subscription
        .items
        .data
        .iter()
        .filter_map(|item| item.price.product.as_ref())
        .map(|p| p.id(|obj| obj.id.as_str()).to_string())
        .collect();
    if !product_ids.is_empty() {
        match stripe.list_products_by_ids(&product_ids).await {
            Ok(products) => {
                confirmation.product_name = products.into_iter().next().map(|p| p.name);
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, "Product lookup failed: {}", e);
            }
        }
    }

    confirmation.price_amount = item
        .price
        .unit_amount
        .map(|amount| format!("{}.{:02}", amount / 100, amount % 100));
    confirmation.price_currency = Some(item.price.currency.to_uppercase());
    confirmation.billing_cycle = Some(
        item.price
            .recurring
            .as_ref()
            .map(|r| r.interval.clone())
            .unwrap_or_else(|| "One Time".to_string()),
    );
    confirmation.start_date = subscription
        .current_period_start
        .map(DateValue::Epoch)
        .as_ref()
        .and_then(format_long_date);
    confirmation.next_billing_date = subscription
        .current_period_end
        .map(DateValue::Epoch)
        .as_ref()
        .and_then(format_long_date);

    Ok(confirmation)
}
