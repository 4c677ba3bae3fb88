//! In-memory plan catalog.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::billing::Plan;
use crate::domain::foundation::{DomainError, PlanId};
use crate::ports::PlanCatalog;

/// Plan catalog backed by a process-local list.
#[derive(Default)]
pub struct InMemoryPlanCatalog {
    plans: RwLock<Vec<Plan>>,
}

impl InMemoryPlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog seeded with the given plans.
    pub fn with_plans(plans: Vec<Plan>) -> Self {
        Self {
            plans: RwLock::new(plans),
        }
    }

    /// Adds a plan to the catalog.
    pub async fn add(&self, plan: Plan) {
        self.plans.write().await.push(plan);
    }
}

#[async_trait]
impl PlanCatalog for InMemoryPlanCatalog {
    async fn list_active(&self) -> Result<Vec<Plan>, DomainError> {
        let mut plans: Vec<Plan> = self
            .plans
            .read()
            .await
            .iter()
            .filter(|p| p.active)
            .cloned()
            .collect();
        plans.sort_by_key(|p| p.price_cents);
        Ok(plans)
    }

    async fn find_by_id(&self, plan_id: &PlanId) -> Result<Option<Plan>, DomainError> {
        Ok(self
            .plans
            .read()
            .await
            .iter()
            .find(|p| &p.id == plan_id)
            .cloned())
    }
}
