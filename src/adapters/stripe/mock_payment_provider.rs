//! Mock payment provider for tests.
//!
//! Records every checkout request so tests can assert the core derived
//! pricing from the stored plan, and supports simulated outages so the
//! retryable/permanent error split can be exercised.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentProvider, ProviderSubscription,
    ProviderSubscriptionStatus, WebhookEvent, WebhookEventKind,
};

/// Failure modes the mock can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    None,
    Network,
    Rejected,
}

/// In-memory PaymentProvider for handler and integration tests.
pub struct MockPaymentProvider {
    session_counter: AtomicU64,
    failure: Mutex<FailureMode>,
    checkout_requests: Mutex<Vec<CreateCheckoutRequest>>,
    cancellations: Mutex<Vec<(String, bool)>>,
    subscriptions: Mutex<Vec<ProviderSubscription>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self {
            session_counter: AtomicU64::new(1),
            failure: Mutex::new(FailureMode::None),
            checkout_requests: Mutex::new(Vec::new()),
            cancellations: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Makes every call fail with a retryable network error.
    pub fn fail_with_network_error(&self) {
        *self.failure.lock().unwrap() = FailureMode::Network;
    }

    /// Makes every call fail with a permanent rejection.
    pub fn fail_with_rejection(&self) {
        *self.failure.lock().unwrap() = FailureMode::Rejected;
    }

    /// Restores normal operation.
    pub fn recover(&self) {
        *self.failure.lock().unwrap() = FailureMode::None;
    }

    /// Registers a subscription that `get_subscription` will return.
    pub fn seed_subscription(&self, subscription: ProviderSubscription) {
        self.subscriptions.lock().unwrap().push(subscription);
    }

    /// Checkout requests the core has issued, in order.
    pub fn checkout_requests(&self) -> Vec<CreateCheckoutRequest> {
        self.checkout_requests.lock().unwrap().clone()
    }

    /// Cancellations the core has requested as (subscription_id, at_period_end).
    pub fn cancellations(&self) -> Vec<(String, bool)> {
        self.cancellations.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), PaymentError> {
        match *self.failure.lock().unwrap() {
            FailureMode::None => Ok(()),
            FailureMode::Network => Err(PaymentError::network("simulated network failure")),
            FailureMode::Rejected => Err(PaymentError::rejected("simulated rejection")),
        }
    }
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.check_failure()?;

        let n = self.session_counter.fetch_add(1, Ordering::SeqCst);
        let session = CheckoutSession {
            id: format!("cs_test_{:08}", n),
            url: format!("https://checkout.stripe.test/c/pay/cs_test_{:08}", n),
        };
        self.checkout_requests.lock().unwrap().push(request);
        Ok(session)
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        self.check_failure()?;
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == subscription_id)
            .cloned())
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<(), PaymentError> {
        self.check_failure()?;
        self.cancellations
            .lock()
            .unwrap()
            .push((subscription_id.to_string(), at_period_end));
        Ok(())
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        self.check_failure()?;

        // The mock accepts the fixed signature "valid" and parses the
        // payload as a pre-reduced event for test convenience.
        if signature != "valid" {
            return Err(PaymentError::invalid_webhook("bad signature"));
        }

        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::invalid_webhook(e.to_string()))?;

        let kind = match value["type"].as_str().unwrap_or_default() {
            "checkout.session.completed" => WebhookEventKind::CheckoutCompleted {
                session_id: value["session_id"].as_str().unwrap_or_default().to_string(),
                mode: value["mode"].as_str().unwrap_or("payment").to_string(),
                customer_id: value["customer_id"].as_str().map(String::from),
                subscription_id: value["subscription_id"].as_str().map(String::from),
                user_id: value["user_id"].as_str().map(String::from),
                plan_id: value["plan_id"].as_str().map(String::from),
            },
            "customer.subscription.updated" => WebhookEventKind::SubscriptionUpdated {
                subscription: ProviderSubscription {
                    id: value["subscription_id"].as_str().unwrap_or_default().to_string(),
                    customer_id: value["customer_id"].as_str().unwrap_or_default().to_string(),
                    status: match value["status"].as_str().unwrap_or("active") {
                        "active" => ProviderSubscriptionStatus::Active,
                        "past_due" => ProviderSubscriptionStatus::PastDue,
                        "canceled" => ProviderSubscriptionStatus::Canceled,
                        _ => ProviderSubscriptionStatus::Unknown,
                    },
                    current_period_start: value["current_period_start"].as_i64().unwrap_or(0),
                    current_period_end: value["current_period_end"].as_i64().unwrap_or(0),
                    cancel_at_period_end: value["cancel_at_period_end"].as_bool().unwrap_or(false),
                },
            },
            "customer.subscription.deleted" => WebhookEventKind::SubscriptionDeleted {
                subscription_id: value["subscription_id"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            },
            "invoice.payment_failed" => WebhookEventKind::PaymentFailed {
                subscription_id: value["subscription_id"].as_str().map(String::from),
            },
            other => WebhookEventKind::Ignored {
                event_type: other.to_string(),
            },
        };

        Ok(WebhookEvent {
            id: value["id"].as_str().unwrap_or("evt_test").to_string(),
            created: value["created"].as_i64().unwrap_or(0),
            kind,
        })
    }
}
