//! Minimal Stripe client over reqwest.
//!
//! Explicitly constructed and injected (no ambient globals); the API base
//! is configurable so tests can point it at a local double. Every call is
//! bounded by the configured timeout; timeouts surface as recoverable
//! [`AppError::Stripe`] failures.

mod types;

pub use types::*;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Address, CreatePriceInput, PricingType, User};

const STRIPE_VERSION: &str = "2024-04-10";

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base(
            &config.stripe_secret_key,
            &config.stripe_api_base,
            Duration::from_secs(config.stripe_timeout_secs),
        )
    }

    pub fn with_base(secret_key: &str, api_base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_VERSION)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Stripe(format!("GET {}: {}", path, e)))?;

        Self::parse_response(path, response).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_VERSION)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Stripe(format!("POST {}: {}", path, e)))?;

        Self::parse_response(path, response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Stripe(format!("{} ({}): {}", path, status, body)));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Stripe(format!("{}: invalid response: {}", path, e)))
    }

    fn customer_form(user: &User) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = Vec::new();
        let mut push = |key: &str, value: &Option<String>| {
            if let Some(v) = value {
                form.push((key.to_string(), v.clone()));
            }
        };

        push("name", &user.name);
        push("email", &user.email);
        push("phone", &user.phone);
        if let Some(Address {
            line1,
            line2,
            city,
            state,
            postal_code,
            country,
        }) = &user.address
        {
            push("address[line1]", line1);
            push("address[line2]", line2);
            push("address[city]", city);
            push("address[state]", state);
            push("address[postal_code]", postal_code);
            push("address[country]", country);
        }
        push("metadata[uid]", &user.uid);
        push("metadata[company_name]", &user.company_name);
        form
    }

    pub async fn create_customer(&self, user: &User) -> Result<Customer> {
        self.post_form("/v1/customers", &Self::customer_form(user))
            .await
    }

    /// Full overwrite of customer fields from current user state, not a diff.
    pub async fn update_customer(&self, customer_id: &str, user: &User) -> Result<Customer> {
        self.post_form(
            &format!("/v1/customers/{}", customer_id),
            &Self::customer_form(user),
        )
        .await
    }

    /// All provider customers tagged with the linking key in metadata.
    pub async fn search_customers_by_uid(&self, uid: &str) -> Result<Vec<Customer>> {
        let list: List<Customer> = self
            .get_json(
                "/v1/customers/search",
                &[("query".to_string(), format!("metadata['uid']:'{}'", uid))],
            )
            .await?;
        Ok(list.data)
    }

    /// First page of prices for an external product id. No follow-up
    /// pagination: a product with more than `limit` prices is a documented
    /// limitation of the mirror.
    pub async fn list_prices(&self, product_id: &str, limit: u32) -> Result<Vec<Price>> {
        let list: List<Price> = self
            .get_json(
                "/v1/prices",
                &[
                    ("product".to_string(), product_id.to_string()),
                    ("limit".to_string(), limit.to_string()),
                ],
            )
            .await?;
        Ok(list.data)
    }

    pub async fn create_price(&self, input: &CreatePriceInput) -> Result<Price> {
        let mut form = vec![
            ("product".to_string(), input.stripe_product_id.clone()),
            ("unit_amount".to_string(), input.unit_amount.to_string()),
            ("currency".to_string(), input.currency.clone()),
        ];
        if input.pricing_type == PricingType::Recurring {
            if let Some(interval) = input.interval {
                form.push(("recurring[interval]".to_string(), interval.to_string()));
            }
            form.push((
                "recurring[interval_count]".to_string(),
                input.interval_count.unwrap_or(1).to_string(),
            ));
        }
        self.post_form("/v1/prices", &form).await
    }

    pub async fn retrieve_product(&self, product_id: &str) -> Result<Product> {
        self.get_json(&format!("/v1/products/{}", product_id), &[])
            .await
    }

    pub async fn list_products_by_ids(&self, ids: &[String]) -> Result<Vec<Product>> {
        let query: Vec<(String, String)> = ids
            .iter()
            .map(|id| ("ids[]".to_string(), id.clone()))
            .collect();
        let list: List<Product> = self.get_json("/v1/products", &query).await?;
        Ok(list.data)
    }

    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        customer_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession> {
        let form = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("customer".to_string(), customer_id.to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
        ];
        self.post_form("/v1/checkout/sessions", &form).await
    }

    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
        expand: &[&str],
    ) -> Result<CheckoutSession> {
        let query: Vec<(String, String)> = expand
            .iter()
            .map(|e| ("expand[]".to_string(), e.to_string()))
            .collect();
        self.get_json(&format!("/v1/checkout/sessions/{}", session_id), &query)
            .await
    }

    /// Every subscription for a customer regardless of status, with the
    /// default payment method and first line item's price expanded.
    pub async fn list_subscriptions_all(&self, customer_id: &str) -> Result<Vec<Subscription>> {
        let list: List<Subscription> = self
            .get_json(
                "/v1/subscriptions",
                &[
                    ("customer".to_string(), customer_id.to_string()),
                    ("status".to_string(), "all".to_string()),
                    (
                        "expand[]".to_string(),
                        "data.default_payment_method".to_string(),
                    ),
                    ("expand[]".to_string(), "data.items.data.price".to_string()),
                ],
            )
            .await?;
        Ok(list.data)
    }

    pub async fn list_charges(&self, customer_id: &str) -> Result<Vec<Charge>> {
        let list: List<Charge> = self
            .get_json(
                "/v1/charges",
                &[("customer".to_string(), customer_id.to_string())],
            )
            .await?;
        Ok(list.data)
    }

    pub async fn list_invoices(&self, customer_id: &str) -> Result<Vec<Invoice>> {
        let list: List<Invoice> = self
            .get_json(
                "/v1/invoices",
                &[("customer".to_string(), customer_id.to_string())],
            )
            .await?;
        Ok(list.data)
    }

    pub async fn list_payment_methods(&self, customer_id: &str) -> Result<Vec<PaymentMethod>> {
        let list: List<PaymentMethod> = self
            .get_json(
                "/v1/payment_methods",
                &[("customer".to_string(), customer_id.to_string())],
            )
            .await?;
        Ok(list.data)
    }
}
