//! HandlePaymentWebhookHandler - Command handler for Stripe webhook events.
//!
//! The signature is verified before any state is touched; a forged or
//! replayed payload is rejected outright. Verified events the core does not
//! act on are acknowledged and logged, never errored, so the provider does
//! not retry them forever.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::billing::{BillingError, Entitlement, EntitlementStatus, PeriodWindow};
use crate::domain::foundation::{PlanId, Timestamp, UserId};
use crate::ports::{
    EntitlementStore, PaymentError, PaymentProvider, PlanCatalog, ProviderSubscription,
    ProviderSubscriptionStatus, WebhookEventKind,
};

use super::{ConfirmPaymentCommand, ConfirmPaymentHandler};

/// Command carrying the raw webhook request.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    pub payload: Vec<u8>,
    pub signature: String,
}

/// What the handler did with a verified event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// Local state was changed.
    Processed { event_type: String },
    /// The event was verified but required no action.
    Skipped { event_type: String },
}

/// Handler for incoming payment webhooks.
///
/// Checkout completions are reconciled through the same path as client-side
/// confirmation; the two routes race freely and converge on the same row.
/// Subscription lifecycle events keep local status in sync with the provider.
pub struct HandlePaymentWebhookHandler {
    store: Arc<dyn EntitlementStore>,
    provider: Arc<dyn PaymentProvider>,
    confirm: ConfirmPaymentHandler,
}

impl HandlePaymentWebhookHandler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        catalog: Arc<dyn PlanCatalog>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let confirm = ConfirmPaymentHandler::new(store.clone(), catalog);
        Self {
            store,
            provider,
            confirm,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<WebhookDisposition, BillingError> {
        // 1. Verify before reading anything out of the payload.
        let event = self
            .provider
            .verify_webhook(&cmd.payload, &cmd.signature)
            .await
            .map_err(|err| match err {
                PaymentError::InvalidWebhook(_) => BillingError::InvalidWebhookSignature,
                other => BillingError::provider_unavailable(other.to_string()),
            })?;

        let event_id = event.id;
        match event.kind {
            WebhookEventKind::CheckoutCompleted {
                session_id,
                mode,
                customer_id,
                subscription_id,
                user_id,
                plan_id,
            } => {
                self.on_checkout_completed(
                    &event_id,
                    &session_id,
                    &mode,
                    customer_id,
                    subscription_id,
                    user_id,
                    plan_id,
                )
                .await
            }
            WebhookEventKind::SubscriptionUpdated { subscription } => {
                self.on_subscription_updated(&event_id, subscription).await
            }
            WebhookEventKind::SubscriptionDeleted { subscription_id } => {
                self.on_subscription_deleted(&event_id, &subscription_id)
                    .await
            }
            WebhookEventKind::PaymentFailed { subscription_id } => {
                self.on_payment_failed(&event_id, subscription_id).await
            }
            WebhookEventKind::Ignored { event_type } => {
                debug!(event_id = %event_id, event_type = %event_type, "webhook event ignored");
                Ok(WebhookDisposition::Skipped { event_type })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_checkout_completed(
        &self,
        event_id: &str,
        session_id: &str,
        mode: &str,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        user_id: Option<String>,
        plan_id: Option<String>,
    ) -> Result<WebhookDisposition, BillingError> {
        let event_type = "checkout.session.completed".to_string();

        // Metadata is attached at checkout creation; a session without it
        // did not come from this application and is acknowledged untouched.
        let (user_id, plan_id) = match (
            user_id.as_deref().map(UserId::new),
            plan_id.as_deref().map(PlanId::new),
        ) {
            (Some(Ok(user_id)), Some(Ok(plan_id))) => (user_id, plan_id),
            _ => {
                warn!(
                    event_id = %event_id,
                    session_id = %session_id,
                    "checkout completed without usable metadata, skipping"
                );
                return Ok(WebhookDisposition::Skipped { event_type });
            }
        };

        // For recurring purchases, read the billed period off the provider
        // subscription. A failed fetch falls back to the locally computed
        // window rather than dropping the activation.
        let provider_period = match (mode, subscription_id.as_deref()) {
            ("subscription", Some(sub_id)) => match self.provider.get_subscription(sub_id).await {
                Ok(Some(sub)) => Some(PeriodWindow::from_provider(
                    sub.current_period_start,
                    sub.current_period_end,
                )),
                Ok(None) => {
                    warn!(subscription_id = %sub_id, "provider has no such subscription");
                    None
                }
                Err(err) => {
                    warn!(subscription_id = %sub_id, error = %err, "period fetch failed, using local window");
                    None
                }
            },
            _ => None,
        };

        self.confirm
            .handle(ConfirmPaymentCommand {
                user_id,
                plan_id,
                provider_period,
                stripe_customer_id: customer_id,
                stripe_subscription_id: subscription_id,
            })
            .await?;

        info!(event_id = %event_id, session_id = %session_id, "checkout reconciled");
        Ok(WebhookDisposition::Processed { event_type })
    }

    async fn on_subscription_updated(
        &self,
        event_id: &str,
        subscription: ProviderSubscription,
    ) -> Result<WebhookDisposition, BillingError> {
        let event_type = "customer.subscription.updated".to_string();

        let mut entitlement = match self
            .store
            .find_by_stripe_subscription(&subscription.id)
            .await?
        {
            Some(entitlement) => entitlement,
            None => {
                warn!(
                    event_id = %event_id,
                    subscription_id = %subscription.id,
                    "subscription update for unknown entitlement, skipping"
                );
                return Ok(WebhookDisposition::Skipped { event_type });
            }
        };

        apply_provider_state(&mut entitlement, &subscription);
        self.store.update(&entitlement).await?;

        info!(
            event_id = %event_id,
            subscription_id = %subscription.id,
            status = ?entitlement.status,
            "subscription state synced"
        );
        Ok(WebhookDisposition::Processed { event_type })
    }

    async fn on_subscription_deleted(
        &self,
        event_id: &str,
        subscription_id: &str,
    ) -> Result<WebhookDisposition, BillingError> {
        let event_type = "customer.subscription.deleted".to_string();

        let mut entitlement = match self
            .store
            .find_by_stripe_subscription(subscription_id)
            .await?
        {
            Some(entitlement) => entitlement,
            None => {
                warn!(
                    event_id = %event_id,
                    subscription_id = %subscription_id,
                    "deletion for unknown entitlement, skipping"
                );
                return Ok(WebhookDisposition::Skipped { event_type });
            }
        };

        // Replays of the deletion land here.
        if entitlement.status == EntitlementStatus::Cancelled {
            return Ok(WebhookDisposition::Skipped { event_type });
        }

        if let Err(err) = entitlement.cancel() {
            warn!(event_id = %event_id, error = %err, "cancel transition refused, skipping");
            return Ok(WebhookDisposition::Skipped { event_type });
        }
        self.store.update(&entitlement).await?;

        info!(event_id = %event_id, subscription_id = %subscription_id, "subscription cancelled by provider");
        Ok(WebhookDisposition::Processed { event_type })
    }

    async fn on_payment_failed(
        &self,
        event_id: &str,
        subscription_id: Option<String>,
    ) -> Result<WebhookDisposition, BillingError> {
        let event_type = "invoice.payment_failed".to_string();

        let subscription_id = match subscription_id {
            Some(id) => id,
            None => {
                // One-off invoices carry no subscription; nothing to flag.
                debug!(event_id = %event_id, "payment failure without subscription, skipping");
                return Ok(WebhookDisposition::Skipped { event_type });
            }
        };

        let mut entitlement = match self
            .store
            .find_by_stripe_subscription(&subscription_id)
            .await?
        {
            Some(entitlement) => entitlement,
            None => {
                warn!(
                    event_id = %event_id,
                    subscription_id = %subscription_id,
                    "payment failure for unknown entitlement, skipping"
                );
                return Ok(WebhookDisposition::Skipped { event_type });
            }
        };

        if entitlement.status == EntitlementStatus::PastDue {
            return Ok(WebhookDisposition::Skipped { event_type });
        }
        if let Err(err) = entitlement.mark_past_due() {
            warn!(event_id = %event_id, error = %err, "past-due transition refused, skipping");
            return Ok(WebhookDisposition::Skipped { event_type });
        }
        self.store.update(&entitlement).await?;

        info!(event_id = %event_id, subscription_id = %subscription_id, "entitlement marked past due");
        Ok(WebhookDisposition::Processed { event_type })
    }
}

/// Folds the provider-reported subscription state into the local row.
///
/// A period end later than the stored one is a renewal: the window advances
/// and the counter restarts for the new period.
fn apply_provider_state(entitlement: &mut Entitlement, subscription: &ProviderSubscription) {
    let window =
        PeriodWindow::from_provider(subscription.current_period_start, subscription.current_period_end);
    if window.end.is_after(&entitlement.current_period_end) {
        entitlement.current_period_start = window.start;
        entitlement.current_period_end = window.end;
        entitlement.usage_count = 0;
        entitlement.usage_reset_at = window.end;
    }

    entitlement.cancel_at_period_end = subscription.cancel_at_period_end;

    let target = match subscription.status {
        ProviderSubscriptionStatus::Active => Some(EntitlementStatus::Active),
        ProviderSubscriptionStatus::PastDue => Some(EntitlementStatus::PastDue),
        ProviderSubscriptionStatus::Canceled => Some(EntitlementStatus::Cancelled),
        ProviderSubscriptionStatus::Unknown => None,
    };
    if let Some(target) = target {
        if entitlement.status != target {
            match entitlement.status.transition_to(target) {
                Ok(status) => entitlement.status = status,
                Err(err) => {
                    warn!(error = %err, "provider status transition refused, keeping local status");
                }
            }
        }
    }

    entitlement.updated_at = Timestamp::now();
}
