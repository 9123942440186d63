//! Payment history aggregator: fans out to the provider across every
//! customer identifier associated with a user and merges the result into
//! one chronological ledger.

use futures::future::try_join_all;

use crate::error::Result;
use crate::models::{PaymentRecord, User};
use crate::stripe::{Charge, Invoice, StripeClient};

/// All payments for a user, newest first. Users with neither a linking key
/// nor a customer identifier get an empty list with zero provider calls.
pub async fn list_payments(stripe: &StripeClient, user: &User) -> Result<Vec<PaymentRecord>> {
    let customer_ids: Vec<String> = if let Some(uid) = &user.uid {
        // One person may own several provider customer records, grouped by
        // the linking key in customer metadata.
        stripe
            .search_customers_by_uid(uid)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect()
    } else if let Some(id) = &user.stripe_customer_id {
        vec![id.clone()]
    } else {
        Vec::new()
    };

    if customer_ids.is_empty() {
        return Ok(Vec::new());
    }

    // Provider latency dominates: issue every fetch concurrently and join.
    let charges = try_join_all(customer_ids.iter().map(|id| stripe.list_charges(id)));
    let invoices = try_join_all(customer_ids.iter().map(|id| stripe.list_invoices(id)));
    let (charges, invoices) = tokio::try_join!(charges, invoices)?;

    Ok(merge_payments(
        charges.into_iter().flatten().collect(),
        invoices.into_iter().flatten().collect(),
    ))
}

/// Normalize charges and invoices into the common payment shape and sort
/// descending by creation time. The sort is stable: ties keep the
/// charges-then-invoices concatenation order.
pub fn merge_payments(charges: Vec<Charge>, invoices: Vec<Invoice>) -> Vec<PaymentRecord> {
    let mut payments: Vec<PaymentRecord> = charges
        .into_iter()
        .map(|charge| PaymentRecord {
            id: charge.id,
            amount: charge.amount,
            currency: charge.currency,
            status: charge.status,
            created: charge.created,
            receipt_url: charge.receipt_url,
            invoice_url: None,
            description: charge.description,
        })
        .chain(invoices.into_iter().map(|invoice| PaymentRecord {
            id: invoice.id,
            amount: invoice.amount_paid,
            currency: invoice.currency,
            status: invoice.status,
            created: invoice.created,
            receipt_url: None,
            invoice_url: invoice.hosted_invoice_url,
            description: invoice.description,
        }))
        .collect();

    payments.sort_by(|a, b| b.created.cmp(&a.created));
    payments
}
