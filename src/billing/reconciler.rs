//! Subscription state reconciler: merges the locally mirrored subscription
//! with a live provider fetch into the single canonical view a render may
//! use. The mirror is eventually consistent (populated by an out-of-core
//! webhook handler); this module exists to mask that staleness at read
//! time.

use serde::Serialize;

use crate::db::{DocumentStore, Filter, collections};
use crate::error::Result;
use crate::models::{Product, StatusColor, SubscriptionRecord, User};
use crate::stripe::{self, Expandable, StripeClient};
use crate::util::{DateValue, format_amount, format_long_date};

/// The two underlying sources a render may disagree between.
#[derive(Debug, Clone)]
pub enum SubscriptionSource {
    Live(stripe::Subscription),
    Mirrored(SubscriptionRecord),
    None,
}

/// Precedence rule: the live record is authoritative only when its status
/// is `active`; otherwise fall back to the mirror, stale or not.
pub fn resolve_source(
    live: Option<stripe::Subscription>,
    mirror: Option<SubscriptionRecord>,
) -> SubscriptionSource {
    match live {
        Some(sub) if sub.status == "active" => SubscriptionSource::Live(sub),
        _ => match mirror {
            Some(record) => SubscriptionSource::Mirrored(record),
            None => SubscriptionSource::None,
        },
    }
}

/// Exhaustive status→color mapping; unknown and absent statuses are green.
pub fn status_color(status: Option<&str>) -> StatusColor {
    match status {
        Some("incomplete_expired") | Some("incomplete") | Some("paused") | Some("past_due") => {
            StatusColor::Yellow
        }
        Some("canceled") | Some("unpaid") => StatusColor::Red,
        _ => StatusColor::Green,
    }
}

/// `"{amount}/{interval}"` for recurring prices, bare amount for one-time,
/// None without a resolvable amount.
pub fn price_label(price: Option<&stripe::Price>) -> Option<String> {
    let price = price?;
    let amount = format_amount(price.unit_amount?, &price.currency);
    match &price.recurring {
        Some(recurring) => Some(format!("{}/{}", amount, recurring.interval)),
        None => Some(amount),
    }
}

/// The canonical subscription view: at most one per render. A `status` of
/// None means "no subscription".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub status: Option<String>,
    pub status_color: StatusColor,
    pub product_name: Option<String>,
    pub price_label: Option<String>,
    pub renewal_date: Option<String>,
    pub canceled_date: Option<String>,
}

impl SubscriptionView {
    fn none() -> Self {
        Self {
            status: None,
            status_color: StatusColor::Green,
            product_name: None,
            price_label: None,
            renewal_date: None,
            canceled_date: None,
        }
    }
}

pub async fn resolve_active_subscription(
    store: &dyn DocumentStore,
    stripe: &StripeClient,
    user: &User,
) -> Result<SubscriptionView> {
    let customer_id = match &user.stripe_customer_id {
        Some(id) => id.clone(),
        None => return Ok(SubscriptionView::none()),
    };

    // Local mirror, keyed by the customer identifier.
    let mirror = store
        .find(
            collections::SUBSCRIPTIONS,
            &Filter::eq("stripeCustomerId", customer_id.as_str()),
            Some(1),
        )
        .await?
        .into_iter()
        .next()
        .and_then(|doc| serde_json::from_value::<SubscriptionRecord>(doc).ok());

    // Live fetch; a provider failure degrades to "no live record".
    let live = match stripe.list_subscriptions_all(&customer_id).await {
        Ok(subs) => subs.into_iter().next(),
        Err(e) => {
            tracing::warn!(
                customer_id = %customer_id,
                "Live subscription fetch failed, falling back to mirror: {}",
                e
            );
            None
        }
    };

    // The live record, when present, supplies the plan and dates for this
    // render even when the precedence rule picks the mirror for status.
    let live_price = live
        .as_ref()
        .and_then(|sub| sub.items.data.first())
        .map(|item| item.price.clone());
    let live_dates = live.as_ref().map(|sub| (sub.current_period_end, sub.ended_at));

    let product_name = resolve_product_name(store, stripe, live_price.as_ref(), &mirror).await?;
    let label = price_label(live_price.as_ref());

    let source = resolve_source(live, mirror);
    let (status, mirror_record) = match &source {
        SubscriptionSource::Live(sub) => (Some(sub.status.clone()), None),
        SubscriptionSource::Mirrored(record) => (Some(record.status.to_string()), Some(record)),
        SubscriptionSource::None => return Ok(SubscriptionView::none()),
    };

    let renewal = match live_dates {
        Some((period_end, _)) => period_end.map(DateValue::Epoch),
        None => mirror_record
            .and_then(|r| r.current_period_end.clone())
            .map(DateValue::Iso),
    };
    let canceled = match live_dates {
        Some((_, ended_at)) => ended_at.map(DateValue::Epoch),
        None => mirror_record
            .and_then(|r| r.ended_at.clone())
            .map(DateValue::Iso),
    };

    let is_canceled = status.as_deref() == Some("canceled");
    Ok(SubscriptionView {
        status_color: status_color(status.as_deref()),
        renewal_date: (!is_canceled)
            .then(|| renewal.as_ref().and_then(format_long_date))
            .flatten(),
        canceled_date: is_canceled
            .then(|| canceled.as_ref().and_then(format_long_date))
            .flatten(),
        status,
        product_name,
        price_label: label,
    })
}

/// Display name: prefer the live provider's product (fetching it when the
/// price carries a bare id), else the mirror's linked product.
async fn resolve_product_name(
    store: &dyn DocumentStore,
    stripe: &StripeClient,
    live_price: Option<&stripe::Price>,
    mirror: &Option<SubscriptionRecord>,
) -> Result<Option<String>> {
    if let Some(product) = live_price.and_then(|price| price.product.as_ref()) {
        match product {
            Expandable::Object(obj) => return Ok(Some(obj.name.clone())),
            Expandable::Id(id) => match stripe.retrieve_product(id).await {
                Ok(product) => return Ok(Some(product.name)),
                Err(e) => {
                    tracing::warn!(product_id = %id, "Product lookup failed: {}", e);
                }
            },
        }
    }

    let product_ref = match mirror.as_ref().and_then(|r| r.product.clone()) {
        Some(id) => id,
        None => return Ok(None),
    };
    let docs = store
        .find(
            collections::PRODUCTS,
            &Filter::eq("id", product_ref),
            Some(1),
        )
        .await?;
    Ok(docs
        .into_iter()
        .next()
        .and_then(|doc| serde_json::from_value::<Product>(doc).ok())
        .map(|product| product.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionStatus;
    use crate::stripe::Recurring;

    fn live_subscription(status: &str) -> stripe::Subscription {
        serde_json::from_value(serde_json::json!({
            "id": "sub_live",
            "status": status,
            "customer": "cus_1",
            "current_period_end": 1_700_000_000i64,
            "items": { "data": [] }
        }))
        .unwrap()
    }

    fn mirror_record(status: SubscriptionStatus) -> SubscriptionRecord {
        SubscriptionRecord {
            id: "local_1".into(),
            user: "u1".into(),
            product: None,
            status,
            current_period_start: None,
            current_period_end: Some("2023-11-14T00:00:00Z".into()),
            ended_at: None,
            cancel_at: None,
            canceled_at: None,
            cancel_at_period_end: false,
            trial_start: None,
            trial_end: None,
            stripe_id: Some("sub_local".into()),
            stripe_customer_id: Some("cus_1".into()),
            metadata: None,
        }
    }

    #[test]
    fn active_live_record_beats_conflicting_mirror() {
        let source = resolve_source(
            Some(live_subscription("active")),
            Some(mirror_record(SubscriptionStatus::Canceled)),
        );
        match source {
            SubscriptionSource::Live(sub) => assert_eq!(sub.id, "sub_live"),
            _ => panic!("expected the live record to win"),
        }
    }

    #[test]
    fn non_active_live_record_falls_back_to_mirror() {
        let source = resolve_source(
            Some(live_subscription("past_due")),
            Some(mirror_record(SubscriptionStatus::Trialing)),
        );
        match source {
            SubscriptionSource::Mirrored(record) => {
                assert_eq!(record.status, SubscriptionStatus::Trialing)
            }
            _ => panic!("expected fallback to the mirror"),
        }
    }

    #[test]
    fn absent_sources_resolve_to_none() {
        assert!(matches!(
            resolve_source(None, None),
            SubscriptionSource::None
        ));
    }

    #[test]
    fn status_colors_are_exhaustive() {
        for status in ["incomplete_expired", "incomplete", "paused", "past_due"] {
            assert_eq!(status_color(Some(status)), StatusColor::Yellow);
        }
        for status in ["canceled", "unpaid"] {
            assert_eq!(status_color(Some(status)), StatusColor::Red);
        }
        for status in ["active", "trialing", "something_new"] {
            assert_eq!(status_color(Some(status)), StatusColor::Green);
        }
        assert_eq!(status_color(None), StatusColor::Green);
    }

    #[test]
    fn recurring_price_label_includes_interval() {
        let price = stripe::Price {
            id: "price_1".into(),
            product: None,
            unit_amount: Some(1999),
            currency: "usd".into(),
            price_type: "recurring".into(),
            recurring: Some(Recurring {
                interval: "month".into(),
                interval_count: Some(1),
                trial_period_days: None,
            }),
            active: true,
        };
        assert_eq!(price_label(Some(&price)), Some("$19.99/month".into()));
    }

    #[test]
    fn one_time_price_label_is_bare_amount() {
        let price = stripe::Price {
            id: "price_1".into(),
            product: None,
            unit_amount: Some(5000),
            currency: "usd".into(),
            price_type: "one_time".into(),
            recurring: None,
            active: true,
        };
        assert_eq!(price_label(Some(&price)), Some("$50.00".into()));
    }

    #[test]
    fn missing_amount_yields_no_label() {
        let price = stripe::Price {
            id: "price_1".into(),
            product: None,
            unit_amount: None,
            currency: "usd".into(),
            price_type: "recurring".into(),
            recurring: None,
            active: true,
        };
        assert_eq!(price_label(Some(&price)), None);
        assert_eq!(price_label(None), None);
    }
}
