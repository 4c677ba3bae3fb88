//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Stripe HTTP API.
//! Checkout sessions are priced inline (`price_data`) from the stored plan,
//! so no price objects need to be pre-provisioned in the Stripe dashboard.
//!
//! # Security
//!
//! - HMAC-SHA256 webhook verification with constant-time comparison
//! - Timestamp validation (5-minute window) against replayed events
//! - Secrets held in `secrecy::SecretString`

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentProvider, ProviderSubscription,
    ProviderSubscriptionStatus, WebhookEvent, WebhookEventKind,
};

use super::webhook_types::{
    SignatureHeader, StripeCheckoutSession, StripeInvoice, StripeSubscription, StripeWebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted webhook event age.
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Tolerance for event timestamps ahead of local time.
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for the Stripe API.
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Points the adapter at a different API host, for tests.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// `PaymentProvider` implementation backed by the Stripe API.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Verifies the v1 signature over `timestamp.payload`.
    fn verify_signature(
        &self,
        payload: &[u8],
        header: &SignatureHeader,
    ) -> Result<(), PaymentError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            warn!(
                event_timestamp = header.timestamp,
                age_secs = age,
                "webhook event too old, rejecting as replay"
            );
            return Err(PaymentError::invalid_webhook(format!(
                "event too old ({age} seconds)"
            )));
        }
        if age < -MAX_FUTURE_TOLERANCE_SECS {
            warn!(
                event_timestamp = header.timestamp,
                "webhook event timestamp in the future"
            );
            return Err(PaymentError::invalid_webhook("event timestamp in future"));
        }

        let mut mac =
            HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
                .map_err(|_| PaymentError::invalid_webhook("unusable webhook secret"))?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        if expected
            .as_slice()
            .ct_eq(header.v1_signature.as_slice())
            .unwrap_u8()
            != 1
        {
            warn!("webhook signature mismatch");
            return Err(PaymentError::invalid_webhook("signature mismatch"));
        }
        Ok(())
    }

    /// Reduces a verified Stripe event to the kinds the core reacts to.
    fn reduce_event(&self, payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
        let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            warn!(error = %e, "unparseable webhook payload");
            PaymentError::invalid_webhook(format!("invalid JSON: {e}"))
        })?;

        let kind = match event.event_type.as_str() {
            "checkout.session.completed" => {
                let session: StripeCheckoutSession =
                    serde_json::from_value(event.data.object).map_err(|e| {
                        PaymentError::invalid_webhook(format!("invalid checkout session: {e}"))
                    })?;
                WebhookEventKind::CheckoutCompleted {
                    session_id: session.id,
                    mode: session.mode,
                    customer_id: session.customer,
                    subscription_id: session.subscription,
                    user_id: session.metadata.get("user_id").cloned(),
                    plan_id: session.metadata.get("plan_id").cloned(),
                }
            }
            "customer.subscription.updated" => {
                let sub: StripeSubscription = serde_json::from_value(event.data.object)
                    .map_err(|e| {
                        PaymentError::invalid_webhook(format!("invalid subscription: {e}"))
                    })?;
                WebhookEventKind::SubscriptionUpdated {
                    subscription: map_subscription(sub),
                }
            }
            "customer.subscription.deleted" => {
                let sub: StripeSubscription = serde_json::from_value(event.data.object)
                    .map_err(|e| {
                        PaymentError::invalid_webhook(format!("invalid subscription: {e}"))
                    })?;
                WebhookEventKind::SubscriptionDeleted {
                    subscription_id: sub.id,
                }
            }
            "invoice.payment_failed" => {
                let invoice: StripeInvoice =
                    serde_json::from_value(event.data.object).map_err(|e| {
                        PaymentError::invalid_webhook(format!("invalid invoice: {e}"))
                    })?;
                WebhookEventKind::PaymentFailed {
                    subscription_id: invoice.subscription,
                }
            }
            other => WebhookEventKind::Ignored {
                event_type: other.to_string(),
            },
        };

        Ok(WebhookEvent {
            id: event.id,
            created: event.created,
            kind,
        })
    }

    /// Maps an unsuccessful Stripe response to the retryable/permanent split.
    async fn api_error(&self, response: reqwest::Response) -> PaymentError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %body, "Stripe API call failed");
        if status.is_server_error() {
            PaymentError::unavailable(format!("Stripe returned {status}"))
        } else {
            PaymentError::rejected(format!("Stripe returned {status}: {body}"))
        }
    }
}

fn map_subscription(sub: StripeSubscription) -> ProviderSubscription {
    let status = match sub.status.as_str() {
        "active" | "trialing" => ProviderSubscriptionStatus::Active,
        "past_due" | "unpaid" => ProviderSubscriptionStatus::PastDue,
        "canceled" | "incomplete_expired" => ProviderSubscriptionStatus::Canceled,
        _ => ProviderSubscriptionStatus::Unknown,
    };
    ProviderSubscription {
        id: sub.id,
        customer_id: sub.customer,
        status,
        current_period_start: sub.current_period_start,
        current_period_end: sub.current_period_end,
        cancel_at_period_end: sub.cancel_at_period_end,
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        let plan = &request.plan;

        // Inline pricing from the stored plan. The client never supplies an
        // amount; it only named a plan id.
        let mut params = vec![
            ("mode", plan.checkout_mode().to_string()),
            ("line_items[0][price_data][currency]", plan.currency.to_lowercase()),
            ("line_items[0][price_data][product_data][name]", plan.name.clone()),
            ("line_items[0][price_data][unit_amount]", plan.price_cents.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("metadata[user_id]", request.user_id.to_string()),
            ("metadata[plan_id]", plan.id.to_string()),
            ("metadata[credits]", plan.allowance.as_column().to_string()),
        ];
        if let Some(interval) = plan.interval.stripe_interval() {
            params.push((
                "line_items[0][price_data][recurring][interval]",
                interval.to_string(),
            ));
        }
        match (request.customer_id, request.customer_email) {
            (Some(customer), _) => params.push(("customer", customer)),
            (None, Some(email)) => params.push(("customer_email", email)),
            (None, None) => {}
        }

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        let session: StripeCheckoutSession = response
            .json()
            .await
            .map_err(|e| PaymentError::parse(e.to_string()))?;

        let redirect = session
            .url
            .ok_or_else(|| PaymentError::parse("checkout session has no redirect URL"))?;

        info!(session_id = %session.id, plan_id = %plan.id, "checkout session created");
        Ok(CheckoutSession {
            id: session.id,
            url: redirect,
        })
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        let url = format!(
            "{}/v1/subscriptions/{}",
            self.config.api_base_url, subscription_id
        );

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        let sub: StripeSubscription = response
            .json()
            .await
            .map_err(|e| PaymentError::parse(e.to_string()))?;
        Ok(Some(map_subscription(sub)))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), PaymentError> {
        let url = format!(
            "{}/v1/subscriptions/{}",
            self.config.api_base_url, subscription_id
        );

        let response = if at_period_end {
            self.http_client
                .post(&url)
                .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
                .form(&[("cancel_at_period_end", "true")])
                .send()
                .await
        } else {
            self.http_client
                .delete(&url)
                .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
                .send()
                .await
        }
        .map_err(|e| PaymentError::network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.api_error(response).await);
        }

        info!(subscription_id = %subscription_id, at_period_end, "subscription cancellation requested");
        Ok(())
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            warn!(error = %e, "malformed Stripe-Signature header");
            PaymentError::invalid_webhook(e.to_string())
        })?;

        self.verify_signature(payload, &header)?;
        let event = self.reduce_event(payload)?;

        info!(event_id = %event.id, "webhook signature verified");
        Ok(event)
    }
}
