//! In-memory entitlement store.
//!
//! The conditional writes run under a single write lock, giving the same
//! atomicity the PostgreSQL adapter gets from conditional UPDATE statements.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::billing::{Entitlement, EntitlementStatus};
use crate::domain::foundation::{DomainError, EntitlementId, ErrorCode, Timestamp, UserId};
use crate::ports::EntitlementStore;

/// Entitlement store backed by a process-local list.
#[derive(Default)]
pub struct InMemoryEntitlementStore {
    rows: RwLock<Vec<Entitlement>>,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all rows, for test assertions.
    pub async fn snapshot(&self) -> Vec<Entitlement> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn find_active_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Entitlement>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|e| &e.user_id == user_id && e.status == EntitlementStatus::Active)
            .cloned())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Entitlement>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|e| &e.user_id == user_id)
            .cloned())
    }

    async fn find_by_stripe_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Entitlement>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|e| e.stripe_subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    async fn insert(&self, entitlement: &Entitlement) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        let duplicate_active = entitlement.status == EntitlementStatus::Active
            && rows.iter().any(|e| {
                e.user_id == entitlement.user_id && e.status == EntitlementStatus::Active
            });
        if duplicate_active {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "User already has an active entitlement",
            ));
        }
        rows.push(entitlement.clone());
        Ok(())
    }

    async fn update(&self, entitlement: &Entitlement) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|e| e.id == entitlement.id) {
            Some(row) => {
                *row = entitlement.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::EntitlementNotFound,
                "Entitlement not found",
            )),
        }
    }

    async fn try_consume(
        &self,
        id: &EntitlementId,
        observed_usage: u32,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|e| {
            e.id == *id && e.status == EntitlementStatus::Active && e.usage_count == observed_usage
        }) {
            Some(row) => {
                row.record_consumption();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn try_reset_usage(
        &self,
        id: &EntitlementId,
        new_reset_at: Timestamp,
        observed_reset_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|e| e.id == *id && e.usage_reset_at == observed_reset_at)
        {
            Some(row) => {
                row.usage_count = 0;
                row.usage_reset_at = new_reset_at;
                row.updated_at = Timestamp::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{CreditAllowance, PeriodWindow, Plan, PlanInterval};
    use crate::domain::foundation::PlanId;

    fn test_plan() -> Plan {
        Plan {
            id: PlanId::new("starter-plan").unwrap(),
            name: "Starter".to_string(),
            description: None,
            price_cents: 900,
            currency: "USD".to_string(),
            interval: PlanInterval::Month,
            allowance: CreditAllowance::Limited(3),
            active: true,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        }
    }

    fn active_entitlement(user: &str) -> Entitlement {
        let plan = test_plan();
        let period = PeriodWindow::compute(plan.interval, Timestamp::now());
        Entitlement::activate_new(
            EntitlementId::new(),
            UserId::new(user).unwrap(),
            &plan,
            period,
        )
    }

    #[tokio::test]
    async fn insert_rejects_second_active_row_for_user() {
        let store = InMemoryEntitlementStore::new();
        store.insert(&active_entitlement("user-1")).await.unwrap();

        let result = store.insert(&active_entitlement("user-1")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn try_consume_fails_on_stale_observation() {
        let store = InMemoryEntitlementStore::new();
        let ent = active_entitlement("user-1");
        store.insert(&ent).await.unwrap();

        assert!(store.try_consume(&ent.id, 0).await.unwrap());
        // Second caller observed the same count; its write must lose.
        assert!(!store.try_consume(&ent.id, 0).await.unwrap());
        assert!(store.try_consume(&ent.id, 1).await.unwrap());
    }

    #[tokio::test]
    async fn try_reset_usage_is_first_writer_wins() {
        let store = InMemoryEntitlementStore::new();
        let mut ent = active_entitlement("user-1");
        ent.usage_count = 3;
        let store_result = store.insert(&ent).await;
        assert!(store_result.is_ok());

        let new_mark = ent.current_period_end;
        assert!(store
            .try_reset_usage(&ent.id, new_mark, ent.usage_reset_at)
            .await
            .unwrap());
        // Replay with the stale observation is a no-op.
        assert!(!store
            .try_reset_usage(&ent.id, new_mark, ent.usage_reset_at)
            .await
            .unwrap());

        let rows = store.snapshot().await;
        assert_eq!(rows[0].usage_count, 0);
        assert_eq!(rows[0].usage_reset_at, new_mark);
    }

    #[tokio::test]
    async fn update_requires_existing_row() {
        let store = InMemoryEntitlementStore::new();
        let ent = active_entitlement("user-1");
        assert!(store.update(&ent).await.is_err());
    }
}
