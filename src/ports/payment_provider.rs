//! Payment provider port for external payment processing.
//!
//! Defines the contract for the payment gateway integration (Stripe).
//! The core never trusts client-supplied pricing: checkout requests carry
//! the stored plan, and the adapter builds line items from it.
//!
//! # Design
//!
//! - **Gateway agnostic**: the interface works with any hosted-checkout provider
//! - **No local side effects**: creating a checkout session never touches
//!   entitlement state; activation happens only in the reconciler
//! - **Retryable vs. permanent**: network failures are distinguished from
//!   provider rejections so callers can retry safely

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::Plan;
use crate::domain::foundation::UserId;

/// Port for the payment provider integration.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a hosted checkout session for a plan purchase.
    ///
    /// One-time plans use payment mode; recurring plans use subscription
    /// mode with the plan's billing interval. Returns the redirect URL and
    /// an opaque session id for later reconciliation.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Fetches a subscription by provider id.
    ///
    /// Used by the webhook path to read the provider-reported billing
    /// period for recurring plans.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError>;

    /// Requests cancellation of a recurring subscription.
    ///
    /// With `at_period_end` the subscription stays active until the paid
    /// period closes.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), PaymentError>;

    /// Verifies a webhook signature and parses the event.
    ///
    /// Must be called before any state change; an invalid signature rejects
    /// the request outright.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}

/// Request to create a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutRequest {
    /// Internal user id, round-tripped through provider metadata.
    pub user_id: UserId,

    /// The stored plan. Pricing, currency, interval, and allowance metadata
    /// all come from here.
    pub plan: Plan,

    /// Customer email to prefill at checkout, when known.
    pub customer_email: Option<String>,

    /// Existing provider customer id to reuse, when known.
    pub customer_id: Option<String>,

    /// Redirect target after successful payment.
    pub success_url: String,

    /// Redirect target if checkout is abandoned.
    pub cancel_url: String,
}

/// A created checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session id (cs_...), kept for reconciliation.
    pub id: String,

    /// URL the client redirects the browser to.
    pub url: String,
}

/// Subscription state as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSubscription {
    /// Provider subscription id (sub_...).
    pub id: String,

    /// Provider customer id (cus_...).
    pub customer_id: String,

    /// Provider-reported status.
    pub status: ProviderSubscriptionStatus,

    /// Current period start (Unix seconds).
    pub current_period_start: i64,

    /// Current period end (Unix seconds).
    pub current_period_end: i64,

    /// Whether the subscription cancels at period end.
    pub cancel_at_period_end: bool,
}

/// Subscription status from the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    Unknown,
}

/// A verified webhook event, reduced to what the reconciler needs.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Provider event id (evt_...), usable for idempotency.
    pub id: String,

    /// Unix timestamp when the provider created the event.
    pub created: i64,

    /// The event payload.
    pub kind: WebhookEventKind,
}

/// Webhook event payloads the core reacts to.
#[derive(Debug, Clone)]
pub enum WebhookEventKind {
    /// Checkout completed; payment succeeded.
    CheckoutCompleted {
        session_id: String,
        /// `payment` for one-time plans, `subscription` for recurring.
        mode: String,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        /// Metadata attached at checkout: user id, plan id, allowance.
        user_id: Option<String>,
        plan_id: Option<String>,
    },

    /// Recurring subscription renewed or otherwise changed.
    SubscriptionUpdated { subscription: ProviderSubscription },

    /// Recurring subscription deleted at the provider.
    SubscriptionDeleted { subscription_id: String },

    /// Invoice payment failed; grace period begins.
    PaymentFailed { subscription_id: Option<String> },

    /// Any event type the core does not act on.
    Ignored { event_type: String },
}

/// Errors from the payment provider integration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    /// Timeout or transport failure. Safe to retry.
    #[error("payment provider network error: {0}")]
    Network(String),

    /// Provider returned 5xx. Safe to retry.
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),

    /// Provider rejected the request (4xx). Not retryable.
    #[error("payment provider rejected request: {0}")]
    Rejected(String),

    /// Webhook signature or payload failed verification.
    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),

    /// Provider response could not be parsed.
    #[error("unparseable provider response: {0}")]
    Parse(String),
}

impl PaymentError {
    pub fn network(reason: impl Into<String>) -> Self {
        PaymentError::Network(reason.into())
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        PaymentError::Unavailable(reason.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        PaymentError::Rejected(reason.into())
    }

    pub fn invalid_webhook(reason: impl Into<String>) -> Self {
        PaymentError::InvalidWebhook(reason.into())
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        PaymentError::Parse(reason.into())
    }

    /// True if the same request can be retried without double-charging.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Network(_) | PaymentError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_provider_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn PaymentProvider) {}
    }

    #[test]
    fn network_and_unavailable_are_retryable() {
        assert!(PaymentError::network("timed out").is_retryable());
        assert!(PaymentError::unavailable("502").is_retryable());
        assert!(!PaymentError::rejected("no such price").is_retryable());
        assert!(!PaymentError::invalid_webhook("bad signature").is_retryable());
    }
}
