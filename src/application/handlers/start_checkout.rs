//! StartCheckoutHandler - Command handler for initiating a plan purchase.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{PlanId, UserId};
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, EntitlementStore, PaymentError, PaymentProvider,
    PlanCatalog,
};

/// Command to start a hosted checkout for a plan.
#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Handler for checkout initiation.
///
/// Creates no local state: the entitlement appears only when the payment is
/// confirmed, so an abandoned checkout leaves nothing behind. Pricing is
/// resolved from the stored plan; the client only ever names a plan id.
pub struct StartCheckoutHandler {
    catalog: Arc<dyn PlanCatalog>,
    store: Arc<dyn EntitlementStore>,
    provider: Arc<dyn PaymentProvider>,
}

impl StartCheckoutHandler {
    pub fn new(
        catalog: Arc<dyn PlanCatalog>,
        store: Arc<dyn EntitlementStore>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            catalog,
            store,
            provider,
        }
    }

    pub async fn handle(&self, cmd: StartCheckoutCommand) -> Result<CheckoutSession, BillingError> {
        // 1. Resolve the plan; retired plans cannot be purchased.
        let plan = self
            .catalog
            .find_active(&cmd.plan_id)
            .await?
            .ok_or_else(|| BillingError::plan_not_found(cmd.plan_id.clone()))?;

        // 2. Reuse the provider customer from any previous purchase so the
        //    payment history stays on one customer record.
        let customer_id = self
            .store
            .find_by_user(&cmd.user_id)
            .await?
            .and_then(|ent| ent.stripe_customer_id);

        // 3. Create the hosted session.
        let session = self
            .provider
            .create_checkout_session(CreateCheckoutRequest {
                user_id: cmd.user_id,
                plan,
                customer_email: cmd.customer_email,
                customer_id,
                success_url: cmd.success_url,
                cancel_url: cmd.cancel_url,
            })
            .await
            .map_err(map_payment_error)?;

        Ok(session)
    }
}

fn map_payment_error(err: PaymentError) -> BillingError {
    if err.is_retryable() {
        BillingError::provider_unavailable(err.to_string())
    } else {
        BillingError::provider_rejected(err.to_string())
    }
}
