//! Command and query handlers for the billing core.

mod cancel_subscription;
mod confirm_payment;
mod consume_credit;
mod get_current_subscription;
mod get_usage;
mod handle_payment_webhook;
mod list_plans;
mod start_checkout;

pub use cancel_subscription::{CancelSubscriptionCommand, CancelSubscriptionHandler};
pub use confirm_payment::{ConfirmPaymentCommand, ConfirmPaymentHandler};
pub use consume_credit::{ConsumeCreditCommand, ConsumeCreditHandler};
pub use get_current_subscription::{
    CurrentSubscription, GetCurrentSubscriptionHandler, GetCurrentSubscriptionQuery,
};
pub use get_usage::{GetUsageHandler, GetUsageQuery};
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, WebhookDisposition,
};
pub use list_plans::ListPlansHandler;
pub use start_checkout::{StartCheckoutCommand, StartCheckoutHandler};
