//! GetCurrentSubscriptionHandler - Query handler for a user's subscription state.

use std::sync::Arc;

use tracing::warn;

use crate::domain::billing::{BillingError, Entitlement, Plan};
use crate::domain::foundation::UserId;
use crate::ports::{EntitlementStore, PlanCatalog};

/// Query for the caller's current subscription.
#[derive(Debug, Clone)]
pub struct GetCurrentSubscriptionQuery {
    pub user_id: UserId,
}

/// An active subscription joined with its plan, when the plan still exists.
#[derive(Debug, Clone)]
pub struct CurrentSubscription {
    pub entitlement: Entitlement,
    pub plan: Option<Plan>,
}

/// Handler for reading the current subscription.
///
/// This is a display query, so it degrades instead of failing: a store error
/// is logged and reported as "no subscription" rather than surfaced to the
/// client. Write paths never take this shortcut.
pub struct GetCurrentSubscriptionHandler {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn PlanCatalog>,
}

impl GetCurrentSubscriptionHandler {
    pub fn new(store: Arc<dyn EntitlementStore>, catalog: Arc<dyn PlanCatalog>) -> Self {
        Self { store, catalog }
    }

    pub async fn handle(
        &self,
        query: GetCurrentSubscriptionQuery,
    ) -> Result<Option<CurrentSubscription>, BillingError> {
        let entitlement = match self.store.find_active_by_user(&query.user_id).await {
            Ok(Some(entitlement)) => entitlement,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(user_id = %query.user_id, error = %err, "subscription lookup failed, reporting none");
                return Ok(None);
            }
        };

        let plan = match self.catalog.find_by_id(&entitlement.plan_id).await {
            Ok(plan) => plan,
            Err(err) => {
                warn!(plan_id = %entitlement.plan_id, error = %err, "plan lookup failed");
                None
            }
        };

        Ok(Some(CurrentSubscription { entitlement, plan }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryEntitlementStore, InMemoryPlanCatalog};
    use crate::domain::billing::{CreditAllowance, PeriodWindow, PlanInterval};
    use crate::domain::foundation::{EntitlementId, PlanId, Timestamp};

    fn starter_plan() -> Plan {
        Plan {
            id: PlanId::new("starter-plan").unwrap(),
            name: "Starter".to_string(),
            description: None,
            price_cents: 900,
            currency: "USD".to_string(),
            interval: PlanInterval::Month,
            allowance: CreditAllowance::Limited(10),
            active: true,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn returns_subscription_with_plan() {
        let plan = starter_plan();
        let store = Arc::new(InMemoryEntitlementStore::new());
        let catalog = Arc::new(InMemoryPlanCatalog::with_plans(vec![plan.clone()]));

        let user = UserId::new("user-1").unwrap();
        let period = PeriodWindow::compute(plan.interval, Timestamp::now());
        let ent = Entitlement::activate_new(EntitlementId::new(), user.clone(), &plan, period);
        store.insert(&ent).await.unwrap();

        let handler = GetCurrentSubscriptionHandler::new(store, catalog);
        let current = handler
            .handle(GetCurrentSubscriptionQuery { user_id: user })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(current.entitlement.id, ent.id);
        assert_eq!(current.plan.unwrap().id, plan.id);
    }

    #[tokio::test]
    async fn returns_none_without_subscription() {
        let handler = GetCurrentSubscriptionHandler::new(
            Arc::new(InMemoryEntitlementStore::new()),
            Arc::new(InMemoryPlanCatalog::new()),
        );

        let current = handler
            .handle(GetCurrentSubscriptionQuery {
                user_id: UserId::new("user-1").unwrap(),
            })
            .await
            .unwrap();
        assert!(current.is_none());
    }

    #[tokio::test]
    async fn missing_plan_still_returns_entitlement() {
        let plan = starter_plan();
        let store = Arc::new(InMemoryEntitlementStore::new());
        // Catalog does not know the plan the entitlement references.
        let catalog = Arc::new(InMemoryPlanCatalog::new());

        let user = UserId::new("user-1").unwrap();
        let period = PeriodWindow::compute(plan.interval, Timestamp::now());
        let ent = Entitlement::activate_new(EntitlementId::new(), user.clone(), &plan, period);
        store.insert(&ent).await.unwrap();

        let handler = GetCurrentSubscriptionHandler::new(store, catalog);
        let current = handler
            .handle(GetCurrentSubscriptionQuery { user_id: user })
            .await
            .unwrap()
            .unwrap();

        assert!(current.plan.is_none());
    }
}
