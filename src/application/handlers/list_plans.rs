//! ListPlansHandler - Query handler for the public plan catalog.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Plan};
use crate::ports::PlanCatalog;

/// Handler for listing purchasable plans.
///
/// This endpoint is public (no authentication); it only ever exposes active
/// catalog entries, sorted by price ascending.
pub struct ListPlansHandler {
    catalog: Arc<dyn PlanCatalog>,
}

impl ListPlansHandler {
    pub fn new(catalog: Arc<dyn PlanCatalog>) -> Self {
        Self { catalog }
    }

    pub async fn handle(&self) -> Result<Vec<Plan>, BillingError> {
        let plans = self.catalog.list_active().await?;
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPlanCatalog;
    use crate::domain::billing::{CreditAllowance, PlanInterval};
    use crate::domain::foundation::{PlanId, Timestamp};

    fn plan(id: &str, price_cents: i64, active: bool) -> Plan {
        Plan {
            id: PlanId::new(id).unwrap(),
            name: id.to_string(),
            description: None,
            price_cents,
            currency: "USD".to_string(),
            interval: PlanInterval::Month,
            allowance: CreditAllowance::Limited(10),
            active,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn lists_only_active_plans_cheapest_first() {
        let catalog = Arc::new(InMemoryPlanCatalog::with_plans(vec![
            plan("pro-plan", 2900, true),
            plan("legacy-plan", 100, false),
            plan("starter-plan", 900, true),
        ]));
        let handler = ListPlansHandler::new(catalog);

        let plans = handler.handle().await.unwrap();
        let ids: Vec<&str> = plans.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["starter-plan", "pro-plan"]);
    }

    #[tokio::test]
    async fn empty_catalog_lists_nothing() {
        let handler = ListPlansHandler::new(Arc::new(InMemoryPlanCatalog::new()));
        assert!(handler.handle().await.unwrap().is_empty());
    }
}
