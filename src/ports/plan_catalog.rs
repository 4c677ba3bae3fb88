//! Plan catalog port (read side).
//!
//! Plans are managed administratively; the core only ever reads them.

use async_trait::async_trait;

use crate::domain::billing::Plan;
use crate::domain::foundation::{DomainError, PlanId};

/// Read-only access to the plan catalog.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    /// Lists purchasable plans, sorted by price ascending.
    async fn list_active(&self) -> Result<Vec<Plan>, DomainError>;

    /// Finds a plan by id regardless of its active flag.
    ///
    /// Returns `None` if no such plan exists.
    async fn find_by_id(&self, plan_id: &PlanId) -> Result<Option<Plan>, DomainError>;

    /// Finds an active plan by id.
    ///
    /// Returns `None` if the plan is missing or deactivated. Checkout and
    /// payment confirmation use this form so a retired plan can no longer
    /// be purchased.
    async fn find_active(&self, plan_id: &PlanId) -> Result<Option<Plan>, DomainError> {
        Ok(self
            .find_by_id(plan_id)
            .await?
            .filter(|plan| plan.active))
    }
}
