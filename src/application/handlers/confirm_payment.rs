//! ConfirmPaymentHandler - Command handler reconciling a confirmed payment
//! into an active entitlement.
//!
//! Both confirmation routes land here: the client-side call after the Stripe
//! redirect and the `checkout.session.completed` webhook. Whichever arrives
//! first activates; the other replays into the same state.

use std::sync::Arc;

use tracing::info;

use crate::domain::billing::{BillingError, Entitlement, PeriodWindow};
use crate::domain::foundation::{EntitlementId, PlanId, Timestamp, UserId};
use crate::ports::{EntitlementStore, PlanCatalog};

/// Command to reconcile a confirmed payment.
#[derive(Debug, Clone)]
pub struct ConfirmPaymentCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,

    /// Provider-reported billing period, when known.
    ///
    /// Present on the webhook route for recurring plans; the client route
    /// carries no provider data and the window is computed locally from the
    /// plan interval.
    pub provider_period: Option<PeriodWindow>,

    /// Stripe customer reference to record, when known.
    pub stripe_customer_id: Option<String>,

    /// Stripe subscription reference to record, when known.
    pub stripe_subscription_id: Option<String>,
}

/// Handler for payment reconciliation.
///
/// Idempotent by construction: activation sets the counter to zero and the
/// window to a deterministic target instead of incrementing anything, so a
/// replay (or the second of the two confirmation routes) rewrites the row to
/// the state it is already in. Reuses the user's existing row regardless of
/// status; a second active row per user can never appear.
pub struct ConfirmPaymentHandler {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn PlanCatalog>,
}

impl ConfirmPaymentHandler {
    pub fn new(store: Arc<dyn EntitlementStore>, catalog: Arc<dyn PlanCatalog>) -> Self {
        Self { store, catalog }
    }

    pub async fn handle(&self, cmd: ConfirmPaymentCommand) -> Result<Entitlement, BillingError> {
        // 1. Resolve the plan being activated.
        let plan = self
            .catalog
            .find_active(&cmd.plan_id)
            .await?
            .ok_or_else(|| BillingError::plan_not_found(cmd.plan_id.clone()))?;

        // 2. Pick the billing window. The provider's word wins for recurring
        //    plans so the local window matches what was actually charged;
        //    one-time plans have no provider period and compute locally.
        let period = match cmd.provider_period {
            Some(period) if plan.interval.is_recurring() => period,
            _ => PeriodWindow::compute(plan.interval, Timestamp::now()),
        };

        // 3. Reuse the existing row when there is one, whatever its status.
        let entitlement = match self.store.find_by_user(&cmd.user_id).await? {
            Some(mut existing) => {
                existing.activate_for_plan(&plan, period)?;
                existing.attach_stripe_refs(cmd.stripe_customer_id, cmd.stripe_subscription_id);
                self.store.update(&existing).await?;
                existing
            }
            None => {
                let mut fresh = Entitlement::activate_new(
                    EntitlementId::new(),
                    cmd.user_id.clone(),
                    &plan,
                    period,
                );
                fresh.attach_stripe_refs(cmd.stripe_customer_id, cmd.stripe_subscription_id);
                self.store.insert(&fresh).await?;
                fresh
            }
        };

        info!(
            user_id = %cmd.user_id,
            plan_id = %plan.id,
            period_end = %entitlement.current_period_end,
            "payment confirmed, entitlement active"
        );
        Ok(entitlement)
    }
}
