//! ConsumeCreditHandler - Command handler for spending one optimization credit.
//!
//! The gate in front of every optimization run. Unlike the read-side usage
//! query this is a write path: store failures propagate instead of degrading,
//! because silently granting credits on a broken store would unmeter the
//! product.

use std::sync::Arc;

use crate::domain::billing::{
    BillingError, ConsumeOutcome, DenialReason, Entitlement, Plan, UsageSnapshot,
};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{EntitlementStore, PlanCatalog};

/// Command to consume one credit.
#[derive(Debug, Clone)]
pub struct ConsumeCreditCommand {
    pub user_id: UserId,
}

/// Handler for credit consumption.
///
/// The counter increment is a compare-and-set keyed on the observed count.
/// A lost race is retried exactly once against a fresh read; a second loss
/// surfaces as [`BillingError::ConflictExhausted`] rather than looping.
pub struct ConsumeCreditHandler {
    store: Arc<dyn EntitlementStore>,
    catalog: Arc<dyn PlanCatalog>,
}

impl ConsumeCreditHandler {
    pub fn new(store: Arc<dyn EntitlementStore>, catalog: Arc<dyn PlanCatalog>) -> Self {
        Self { store, catalog }
    }

    pub async fn handle(&self, cmd: ConsumeCreditCommand) -> Result<ConsumeOutcome, BillingError> {
        // 1. Load the active entitlement. No entitlement is an outcome, not
        //    an error: the client renders an upgrade prompt from it.
        let entitlement = match self.store.find_active_by_user(&cmd.user_id).await? {
            Some(entitlement) => entitlement,
            None => {
                return Ok(ConsumeOutcome::Denied {
                    reason: DenialReason::NoEntitlement,
                    snapshot: UsageSnapshot::no_subscription(),
                })
            }
        };

        // 2. The allowance lives on the plan.
        let plan = self
            .catalog
            .find_by_id(&entitlement.plan_id)
            .await?
            .ok_or_else(|| BillingError::plan_not_found(entitlement.plan_id.clone()))?;

        // 3. Lazy reset before metering.
        let entitlement = self.reset_if_due(entitlement).await?;
        let entitlement = match entitlement {
            Some(entitlement) => entitlement,
            None => {
                return Ok(ConsumeOutcome::Denied {
                    reason: DenialReason::NoEntitlement,
                    snapshot: UsageSnapshot::no_subscription(),
                })
            }
        };

        // 4. Unlimited plans bypass the counter entirely: no write, no CAS.
        if plan.allowance.is_unlimited() {
            return Ok(ConsumeOutcome::Consumed {
                snapshot: UsageSnapshot::from_counter(
                    entitlement.usage_count,
                    plan.allowance,
                    entitlement.usage_reset_at,
                ),
            });
        }

        // 5. First attempt against the observed count.
        if let Some(outcome) = self.attempt(&entitlement, &plan).await? {
            return Ok(outcome);
        }

        // 6. Lost the race; re-read and retry once.
        let fresh = match self.store.find_active_by_user(&cmd.user_id).await? {
            Some(fresh) => fresh,
            None => {
                return Ok(ConsumeOutcome::Denied {
                    reason: DenialReason::NoEntitlement,
                    snapshot: UsageSnapshot::no_subscription(),
                })
            }
        };
        // A concurrent confirm may have switched the plan between the two
        // attempts; meter the fresh row against its own plan's allowance.
        let plan = if fresh.plan_id == plan.id {
            plan
        } else {
            self.catalog
                .find_by_id(&fresh.plan_id)
                .await?
                .ok_or_else(|| BillingError::plan_not_found(fresh.plan_id.clone()))?
        };
        if plan.allowance.is_unlimited() {
            return Ok(ConsumeOutcome::Consumed {
                snapshot: UsageSnapshot::from_counter(
                    fresh.usage_count,
                    plan.allowance,
                    fresh.usage_reset_at,
                ),
            });
        }
        match self.attempt(&fresh, &plan).await? {
            Some(outcome) => Ok(outcome),
            None => Err(BillingError::ConflictExhausted),
        }
    }

    /// One gate-then-write attempt. `Ok(None)` means the conditional write
    /// lost its race and the caller should re-read.
    async fn attempt(
        &self,
        entitlement: &Entitlement,
        plan: &Plan,
    ) -> Result<Option<ConsumeOutcome>, BillingError> {
        let remaining = plan
            .allowance
            .remaining_after(entitlement.usage_count)
            .unwrap_or(u32::MAX);
        if remaining == 0 {
            return Ok(Some(ConsumeOutcome::Denied {
                reason: DenialReason::LimitExceeded,
                snapshot: UsageSnapshot::from_counter(
                    entitlement.usage_count,
                    plan.allowance,
                    entitlement.usage_reset_at,
                ),
            }));
        }

        if self
            .store
            .try_consume(&entitlement.id, entitlement.usage_count)
            .await?
        {
            return Ok(Some(ConsumeOutcome::Consumed {
                snapshot: UsageSnapshot::from_counter(
                    entitlement.usage_count + 1,
                    plan.allowance,
                    entitlement.usage_reset_at,
                ),
            }));
        }
        Ok(None)
    }

    /// Write-path lazy reset: errors propagate, and the row is re-read after
    /// the conditional write so the attempt meters against the winner's state.
    async fn reset_if_due(
        &self,
        entitlement: Entitlement,
    ) -> Result<Option<Entitlement>, BillingError> {
        if !entitlement.reset_due(Timestamp::now()) {
            return Ok(Some(entitlement));
        }

        self.store
            .try_reset_usage(
                &entitlement.id,
                entitlement.current_period_end,
                entitlement.usage_reset_at,
            )
            .await?;
        Ok(self.store.find_active_by_user(&entitlement.user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryEntitlementStore, InMemoryPlanCatalog};
    use crate::domain::billing::{CreditAllowance, PeriodWindow, PlanInterval};
    use crate::domain::foundation::{EntitlementId, PlanId};

    fn plan(allowance: CreditAllowance) -> Plan {
        Plan {
            id: PlanId::new("starter-plan").unwrap(),
            name: "Starter".to_string(),
            description: None,
            price_cents: 900,
            currency: "USD".to_string(),
            interval: PlanInterval::Lifetime,
            allowance,
            active: true,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    async fn handler_with(
        plan: &Plan,
        mutate: impl FnOnce(&mut Entitlement),
    ) -> (ConsumeCreditHandler, Arc<InMemoryEntitlementStore>) {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let catalog = Arc::new(InMemoryPlanCatalog::with_plans(vec![plan.clone()]));

        let period = PeriodWindow::compute(plan.interval, Timestamp::now());
        let mut ent = Entitlement::activate_new(EntitlementId::new(), user(), plan, period);
        mutate(&mut ent);
        store.insert(&ent).await.unwrap();

        (ConsumeCreditHandler::new(store.clone(), catalog), store)
    }

    #[tokio::test]
    async fn consumes_when_credits_remain() {
        let plan = plan(CreditAllowance::Limited(3));
        let (handler, store) = handler_with(&plan, |_| {}).await;

        let outcome = handler
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();

        assert!(outcome.is_consumed());
        assert_eq!(outcome.snapshot().usage_count, 1);
        assert_eq!(outcome.snapshot().remaining, 2);
        assert_eq!(store.snapshot().await[0].usage_count, 1);
    }

    #[tokio::test]
    async fn denies_without_subscription() {
        let handler = ConsumeCreditHandler::new(
            Arc::new(InMemoryEntitlementStore::new()),
            Arc::new(InMemoryPlanCatalog::new()),
        );

        let outcome = handler
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ConsumeOutcome::Denied {
                reason: DenialReason::NoEntitlement,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn fourth_consume_on_three_credit_plan_is_denied() {
        let plan = plan(CreditAllowance::Limited(3));
        let (handler, store) = handler_with(&plan, |_| {}).await;

        for _ in 0..3 {
            let outcome = handler
                .handle(ConsumeCreditCommand { user_id: user() })
                .await
                .unwrap();
            assert!(outcome.is_consumed());
        }

        let outcome = handler
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ConsumeOutcome::Denied {
                reason: DenialReason::LimitExceeded,
                ..
            }
        ));
        assert_eq!(outcome.snapshot().remaining, 0);
        // The counter did not move past the limit.
        assert_eq!(store.snapshot().await[0].usage_count, 3);
    }

    #[tokio::test]
    async fn stale_reset_restores_credits_before_metering() {
        let mut plan = plan(CreditAllowance::Limited(5));
        plan.interval = PlanInterval::Month;
        let (handler, store) = handler_with(&plan, |ent| {
            ent.usage_count = 5;
            ent.usage_reset_at = Timestamp::now().minus_days(1);
        })
        .await;

        let outcome = handler
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();

        assert!(outcome.is_consumed());
        assert_eq!(outcome.snapshot().usage_count, 1);
        assert_eq!(store.snapshot().await[0].usage_count, 1);
    }

    #[tokio::test]
    async fn unlimited_plan_never_denies() {
        let plan = plan(CreditAllowance::Unlimited);
        let (handler, _store) = handler_with(&plan, |ent| ent.usage_count = 1_000).await;

        let outcome = handler
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();

        assert!(outcome.is_consumed());
        assert_eq!(outcome.snapshot().allowance, CreditAllowance::Unlimited);
    }

    #[tokio::test]
    async fn unlimited_plan_leaves_the_counter_untouched() {
        let plan = plan(CreditAllowance::Unlimited);
        let (handler, store) = handler_with(&plan, |_| {}).await;

        for _ in 0..5 {
            let outcome = handler
                .handle(ConsumeCreditCommand { user_id: user() })
                .await
                .unwrap();
            assert!(outcome.is_consumed());
            assert_eq!(outcome.snapshot().usage_count, 0);
        }

        assert_eq!(store.snapshot().await[0].usage_count, 0);
    }

    /// Store that scripts the race: each read pops the next row state, and
    /// each conditional write pops the next result.
    struct RacingStore {
        reads: std::sync::Mutex<std::collections::VecDeque<Entitlement>>,
        consume_results: std::sync::Mutex<std::collections::VecDeque<bool>>,
    }

    #[async_trait::async_trait]
    impl crate::ports::EntitlementStore for RacingStore {
        async fn find_active_by_user(
            &self,
            _user_id: &UserId,
        ) -> Result<Option<Entitlement>, crate::domain::foundation::DomainError> {
            Ok(self.reads.lock().unwrap().pop_front())
        }

        async fn find_by_user(
            &self,
            _user_id: &UserId,
        ) -> Result<Option<Entitlement>, crate::domain::foundation::DomainError> {
            unreachable!()
        }

        async fn find_by_stripe_subscription(
            &self,
            _subscription_id: &str,
        ) -> Result<Option<Entitlement>, crate::domain::foundation::DomainError> {
            unreachable!()
        }

        async fn insert(
            &self,
            _entitlement: &Entitlement,
        ) -> Result<(), crate::domain::foundation::DomainError> {
            unreachable!()
        }

        async fn update(
            &self,
            _entitlement: &Entitlement,
        ) -> Result<(), crate::domain::foundation::DomainError> {
            unreachable!()
        }

        async fn try_consume(
            &self,
            _id: &EntitlementId,
            _observed_usage: u32,
        ) -> Result<bool, crate::domain::foundation::DomainError> {
            Ok(self.consume_results.lock().unwrap().pop_front().unwrap())
        }

        async fn try_reset_usage(
            &self,
            _id: &EntitlementId,
            _new_reset_at: Timestamp,
            _observed_reset_at: Timestamp,
        ) -> Result<bool, crate::domain::foundation::DomainError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn retry_after_lost_race_meters_against_the_switched_plan() {
        let starter = plan(CreditAllowance::Limited(3));
        let mut pro = plan(CreditAllowance::Limited(30));
        pro.id = PlanId::new("pro-monthly").unwrap();
        pro.interval = PlanInterval::Month;

        let period = PeriodWindow::compute(PlanInterval::Month, Timestamp::now());
        let before = Entitlement::activate_new(EntitlementId::new(), user(), &starter, period);
        // A concurrent confirm switched the user to the pro plan and the
        // first conditional write lost; the fresh row is full under the old
        // plan's limit but barely used under the new one.
        let mut after = before.clone();
        after.activate_for_plan(&pro, period).unwrap();
        after.usage_count = 3;

        let store = Arc::new(RacingStore {
            reads: std::sync::Mutex::new([before, after].into()),
            consume_results: std::sync::Mutex::new([false, true].into()),
        });
        let catalog = Arc::new(InMemoryPlanCatalog::with_plans(vec![starter, pro]));
        let handler = ConsumeCreditHandler::new(store, catalog);

        let outcome = handler
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();

        assert!(outcome.is_consumed());
        assert_eq!(outcome.snapshot().usage_count, 4);
        assert_eq!(outcome.snapshot().remaining, 26);
    }

    #[tokio::test]
    async fn concurrent_consumes_grant_exactly_the_allowance() {
        let plan = plan(CreditAllowance::Limited(1));
        let store = Arc::new(InMemoryEntitlementStore::new());
        let catalog = Arc::new(InMemoryPlanCatalog::with_plans(vec![plan.clone()]));

        let period = PeriodWindow::compute(plan.interval, Timestamp::now());
        let ent = Entitlement::activate_new(EntitlementId::new(), user(), &plan, period);
        store.insert(&ent).await.unwrap();

        let handler = Arc::new(ConsumeCreditHandler::new(store.clone(), catalog));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handler = handler.clone();
            tasks.push(tokio::spawn(async move {
                handler
                    .handle(ConsumeCreditCommand { user_id: user() })
                    .await
            }));
        }

        let mut consumed = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(outcome) if outcome.is_consumed() => consumed += 1,
                Ok(_) | Err(BillingError::ConflictExhausted) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(consumed, 1);
        assert_eq!(store.snapshot().await[0].usage_count, 1);
    }
}
