//! CancelSubscriptionHandler - Command handler for user-initiated cancellation.

use std::sync::Arc;

use tracing::info;

use crate::domain::billing::{BillingError, Entitlement};
use crate::domain::foundation::UserId;
use crate::ports::{EntitlementStore, PaymentError, PaymentProvider};

/// Command to cancel the caller's subscription at period end.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
}

/// Handler for cancellation.
///
/// Access continues until the paid period closes; the flag only stops the
/// renewal. Recurring subscriptions are cancelled at the provider first, so
/// a provider failure leaves local state untouched and the user can retry.
/// One-time purchases have nothing to cancel upstream and only flip the flag.
pub struct CancelSubscriptionHandler {
    store: Arc<dyn EntitlementStore>,
    provider: Arc<dyn PaymentProvider>,
}

impl CancelSubscriptionHandler {
    pub fn new(store: Arc<dyn EntitlementStore>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { store, provider }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<Entitlement, BillingError> {
        // 1. Only an active subscription can be cancelled.
        let mut entitlement = self
            .store
            .find_active_by_user(&cmd.user_id)
            .await?
            .ok_or_else(|| BillingError::no_active_entitlement(cmd.user_id.clone()))?;

        // 2. Mirror the cancellation to the provider before touching local
        //    state. Skipped for one-time purchases, which have no upstream
        //    subscription.
        if let Some(subscription_id) = entitlement.stripe_subscription_id.clone() {
            self.provider
                .cancel_subscription(&subscription_id, true)
                .await
                .map_err(map_payment_error)?;
        }

        // 3. Record the pending cancellation.
        entitlement.request_cancellation();
        self.store.update(&entitlement).await?;

        info!(
            user_id = %cmd.user_id,
            period_end = %entitlement.current_period_end,
            "subscription set to cancel at period end"
        );
        Ok(entitlement)
    }
}

fn map_payment_error(err: PaymentError) -> BillingError {
    if err.is_retryable() {
        BillingError::provider_unavailable(err.to_string())
    } else {
        BillingError::provider_rejected(err.to_string())
    }
}
