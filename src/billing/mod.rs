//! The billing reconciliation core: keeps local subscription/customer
//! records consistent with the external payment processor across reads,
//! user-initiated mutations, and catalog writes.

pub mod checkout;
pub mod confirmation;
pub mod customer_sync;
pub mod payments;
pub mod price_mirror;
pub mod reconciler;

pub use checkout::{CheckoutRedirects, CheckoutResult, issue_checkout};
pub use confirmation::{CheckoutConfirmation, confirm_checkout};
pub use customer_sync::{WriteOperation, on_user_persisted, sync_user};
pub use payments::list_payments;
pub use price_mirror::{populate_product_prices, resolve_product_link};
pub use reconciler::{SubscriptionSource, SubscriptionView, resolve_active_subscription};
