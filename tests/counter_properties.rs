//! Property tests for the usage counter invariants.

use proptest::prelude::*;

use resume_rewriter::domain::billing::{
    CreditAllowance, Entitlement, PeriodWindow, Plan, PlanInterval, UsageSnapshot,
};
use resume_rewriter::domain::foundation::{EntitlementId, PlanId, Timestamp, UserId};

fn plan_with_limit(limit: u32) -> Plan {
    Plan {
        id: PlanId::new("prop-plan").unwrap(),
        name: "Prop".to_string(),
        description: None,
        price_cents: 1000,
        currency: "usd".to_string(),
        interval: PlanInterval::Month,
        allowance: CreditAllowance::Limited(limit),
        active: true,
        created_at: Timestamp::now(),
        updated_at: Timestamp::now(),
    }
}

proptest! {
    #[test]
    fn remaining_never_exceeds_the_limit(usage in 0u32..10_000, limit in 0u32..10_000) {
        let allowance = CreditAllowance::Limited(limit);
        let remaining = allowance.remaining_after(usage).unwrap();

        prop_assert!(remaining <= limit);
        // Remaining plus consumed covers the limit exactly once usage is
        // clamped to it.
        prop_assert_eq!(remaining + usage.min(limit), limit);
    }

    #[test]
    fn unlimited_allowance_never_reports_remaining(usage in 0u32..1_000_000) {
        prop_assert!(CreditAllowance::Unlimited.remaining_after(usage).is_none());
    }

    #[test]
    fn lazy_reset_always_lands_on_zero_and_period_end(
        usage in 0u32..10_000,
        limit in 1u32..10_000,
        stale_days in 1i64..400,
    ) {
        let plan = plan_with_limit(limit);
        let period = PeriodWindow {
            start: Timestamp::now().minus_days(stale_days),
            end: Timestamp::now().add_days(30),
        };
        let mut ent = Entitlement::activate_new(
            EntitlementId::new(),
            UserId::new("prop-user").unwrap(),
            &plan,
            period,
        );
        ent.usage_count = usage;
        ent.usage_reset_at = Timestamp::now().minus_days(stale_days);

        prop_assert!(ent.reset_due(Timestamp::now()));
        ent.apply_lazy_reset();

        prop_assert_eq!(ent.usage_count, 0);
        prop_assert_eq!(ent.usage_reset_at, ent.current_period_end);
        // A second reset before the boundary is never due.
        prop_assert!(!ent.reset_due(Timestamp::now()));
    }

    #[test]
    fn activation_always_restarts_the_counter(usage in 0u32..10_000, limit in 1u32..10_000) {
        let plan = plan_with_limit(limit);
        let period = PeriodWindow::compute(plan.interval, Timestamp::now());
        let mut ent = Entitlement::activate_new(
            EntitlementId::new(),
            UserId::new("prop-user").unwrap(),
            &plan,
            period,
        );
        ent.usage_count = usage;

        ent.activate_for_plan(&plan, period).unwrap();

        prop_assert_eq!(ent.usage_count, 0);
        prop_assert_eq!(ent.usage_reset_at, ent.current_period_end);
    }

    #[test]
    fn snapshot_remaining_is_consistent_with_counter(
        usage in 0u32..10_000,
        limit in 0u32..10_000,
    ) {
        let snapshot = UsageSnapshot::from_counter(
            usage,
            CreditAllowance::Limited(limit),
            Timestamp::now(),
        );

        prop_assert!(snapshot.has_subscription);
        prop_assert_eq!(snapshot.remaining, limit.saturating_sub(usage));
    }

    #[test]
    fn consumption_sequences_never_wrap(consumes in 0usize..200) {
        let plan = plan_with_limit(50);
        let period = PeriodWindow::compute(plan.interval, Timestamp::now());
        let mut ent = Entitlement::activate_new(
            EntitlementId::new(),
            UserId::new("prop-user").unwrap(),
            &plan,
            period,
        );

        for _ in 0..consumes {
            ent.record_consumption();
        }

        prop_assert_eq!(ent.usage_count as usize, consumes);
    }
}
