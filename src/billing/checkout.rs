//! Checkout session issuer: opens a provider-hosted subscription flow.
//! Pure request/response; never mutates local state, never throws a
//! provider failure past this boundary.

use serde::Deserialize;

use crate::stripe::StripeClient;

/// Caller-supplied redirect overrides for the hosted flow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRedirects {
    #[serde(default)]
    pub success: Option<String>,
    #[serde(default)]
    pub cancel: Option<String>,
}

/// Tagged outcome of a checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutResult {
    Created { session_id: String },
    Failed { error: String },
}

/// Provider-templated placeholder; Stripe substitutes the session id when
/// redirecting back.
const SESSION_ID_TEMPLATE: &str = "?session_id={CHECKOUT_SESSION_ID}";

pub async fn issue_checkout(
    stripe: &StripeClient,
    price_id: &str,
    customer_id: &str,
    redirects: &CheckoutRedirects,
    site_url: &str,
) -> CheckoutResult {
    if price_id.trim().is_empty() {
        return CheckoutResult::Failed {
            error: "Price ID is required".to_string(),
        };
    }

    let success_url = format!(
        "{}{}",
        redirects
            .success
            .clone()
            .unwrap_or_else(|| format!("{}/subscription-success", site_url)),
        SESSION_ID_TEMPLATE
    );
    let cancel_url = redirects
        .cancel
        .clone()
        .unwrap_or_else(|| site_url.to_string());

    match stripe
        .create_checkout_session(price_id, customer_id, &success_url, &cancel_url)
        .await
    {
        Ok(session) => CheckoutResult::Created {
            session_id: session.id,
        },
        Err(e) => {
            tracing::error!(
                price_id = %price_id,
                customer_id = %customer_id,
                "Checkout session creation failed: {}",
                e
            );
            CheckoutResult::Failed {
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_client() -> StripeClient {
        // The guard path must return before any request is attempted.
        StripeClient::with_base("sk_test_x", "http://127.0.0.1:1", Duration::from_millis(50))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_price_id_fails_without_a_provider_call() {
        let result = issue_checkout(
            &unreachable_client(),
            "",
            "cus_123",
            &CheckoutRedirects::default(),
            "https://example.com",
        )
        .await;
        assert_eq!(
            result,
            CheckoutResult::Failed {
                error: "Price ID is required".to_string()
            }
        );
    }

    #[tokio::test]
    async fn whitespace_price_id_is_rejected_too() {
        let result = issue_checkout(
            &unreachable_client(),
            "   ",
            "cus_123",
            &CheckoutRedirects::default(),
            "https://example.com",
        )
        .await;
        assert!(matches!(result, CheckoutResult::Failed { .. }));
    }

    #[tokio::test]
    async fn provider_failure_is_tagged_not_thrown() {
        let result = issue_checkout(
            &unreachable_client(),
            "price_123",
            "cus_123",
            &CheckoutRedirects::default(),
            "https://example.com",
        )
        .await;
        assert!(matches!(result, CheckoutResult::Failed { .. }));
    }
}
