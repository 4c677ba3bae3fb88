//! GetUsageHandler - Query handler for the credit position.
//!
//! Performs the lazy counter reset on read: there is no scheduler advancing
//! reset marks, so whichever request first observes a due reset applies it
//! through a compare-and-set write.

use std::sync::Arc;

use tracing::warn;

use crate::domain::billing::{BillingError, Entitlement, UsageSnapshot};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{EntitlementStore, PlanCatalog};

/// Query for the caller's credit position.
#[derive(Debug, Clone)]
pub struct GetUsageQuery {
    pub user_id: UserId,
}

/// Handler for the usage query.
///
/// Degrades on read failure: any store or catalog error is logged and the
/// caller sees the "no subscription" snapshot. A soft gate must never turn
/// a flaky lookup into a hard error for the client.
pub struct GetUsageHandler {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn PlanCatalog>,
}

impl GetUsageHandler {
    pub fn new(store: Arc<dyn EntitlementStore>, catalog: Arc<dyn PlanCatalog>) -> Self {
        Self { store, catalog }
    }

    pub async fn handle(&self, query: GetUsageQuery) -> Result<UsageSnapshot, BillingError> {
        // 1. Find the active entitlement; absent or unreadable means no credits.
        let entitlement = match self.store.find_active_by_user(&query.user_id).await {
            Ok(Some(entitlement)) => entitlement,
            Ok(None) => return Ok(UsageSnapshot::no_subscription()),
            Err(err) => {
                warn!(user_id = %query.user_id, error = %err, "usage lookup failed, reporting no subscription");
                return Ok(UsageSnapshot::no_subscription());
            }
        };

        // 2. The allowance lives on the plan.
        let plan = match self.catalog.find_by_id(&entitlement.plan_id).await {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                warn!(plan_id = %entitlement.plan_id, "entitlement references unknown plan");
                return Ok(UsageSnapshot::no_subscription());
            }
            Err(err) => {
                warn!(plan_id = %entitlement.plan_id, error = %err, "plan lookup failed, reporting no subscription");
                return Ok(UsageSnapshot::no_subscription());
            }
        };

        // 3. Apply the lazy reset when the mark has passed.
        let entitlement = self.reset_if_due(entitlement).await;

        Ok(UsageSnapshot::from_counter(
            entitlement.usage_count,
            plan.allowance,
            entitlement.usage_reset_at,
        ))
    }

    /// Resets the counter through the store when due, returning the row as
    /// it stands after the attempt.
    ///
    /// A lost race means another request already reset; either way the row
    /// is re-read so the snapshot reflects the winner's write.
    pub(crate) async fn reset_if_due(&self, entitlement: Entitlement) -> Entitlement {
        if !entitlement.reset_due(Timestamp::now()) {
            return entitlement;
        }

        let cas = self
            .store
            .try_reset_usage(
                &entitlement.id,
                entitlement.current_period_end,
                entitlement.usage_reset_at,
            )
            .await;
        if let Err(err) = cas {
            warn!(entitlement_id = %entitlement.id, error = %err, "lazy reset write failed");
        }

        match self.store.find_active_by_user(&entitlement.user_id).await {
            Ok(Some(fresh)) => fresh,
            _ => {
                // Fall back to the local mirror of the reset.
                let mut entitlement = entitlement;
                entitlement.apply_lazy_reset();
                entitlement
            }
        }
    }
}
