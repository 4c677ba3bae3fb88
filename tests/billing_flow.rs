//! End-to-end billing scenarios against the in-memory adapters.
//!
//! These drive the application handlers directly, the way the HTTP layer
//! does, and check the full purchase/consume/reset lifecycle.

use std::sync::Arc;

use resume_rewriter::adapters::memory::{InMemoryEntitlementStore, InMemoryPlanCatalog};
use resume_rewriter::adapters::stripe::MockPaymentProvider;
use resume_rewriter::application::handlers::{
    ConfirmPaymentCommand, ConfirmPaymentHandler, ConsumeCreditCommand, ConsumeCreditHandler,
    GetUsageHandler, GetUsageQuery, StartCheckoutCommand, StartCheckoutHandler,
};
use resume_rewriter::domain::billing::{
    lifetime_period_end, ConsumeOutcome, CreditAllowance, DenialReason, Plan, PlanInterval,
};
use resume_rewriter::domain::foundation::{PlanId, Timestamp, UserId};
use resume_rewriter::ports::EntitlementStore;

fn plan(id: &str, interval: PlanInterval, allowance: CreditAllowance, price_cents: i64) -> Plan {
    Plan {
        id: PlanId::new(id).unwrap(),
        name: id.to_string(),
        description: None,
        price_cents,
        currency: "usd".to_string(),
        interval,
        allowance,
        active: true,
        created_at: Timestamp::now(),
        updated_at: Timestamp::now(),
    }
}

struct Fixture {
    store: Arc<InMemoryEntitlementStore>,
    catalog: Arc<InMemoryPlanCatalog>,
    provider: Arc<MockPaymentProvider>,
}

impl Fixture {
    fn new() -> Self {
        let catalog = Arc::new(InMemoryPlanCatalog::with_plans(vec![
            plan(
                "starter-plan",
                PlanInterval::Lifetime,
                CreditAllowance::Limited(3),
                900,
            ),
            plan(
                "pro-monthly",
                PlanInterval::Month,
                CreditAllowance::Limited(30),
                1900,
            ),
            plan(
                "lifetime-unlimited",
                PlanInterval::Lifetime,
                CreditAllowance::Unlimited,
                9900,
            ),
        ]));
        Self {
            store: Arc::new(InMemoryEntitlementStore::new()),
            catalog,
            provider: Arc::new(MockPaymentProvider::new()),
        }
    }

    fn checkout(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.catalog.clone(),
            self.store.clone(),
            self.provider.clone(),
        )
    }

    fn confirm(&self) -> ConfirmPaymentHandler {
        ConfirmPaymentHandler::new(self.store.clone(), self.catalog.clone())
    }

    fn consume(&self) -> ConsumeCreditHandler {
        ConsumeCreditHandler::new(self.store.clone(), self.catalog.clone())
    }

    fn usage(&self) -> GetUsageHandler {
        GetUsageHandler::new(self.store.clone(), self.catalog.clone())
    }
}

fn user() -> UserId {
    UserId::new("user-1").unwrap()
}

fn confirm_cmd(plan_id: &str) -> ConfirmPaymentCommand {
    ConfirmPaymentCommand {
        user_id: user(),
        plan_id: PlanId::new(plan_id).unwrap(),
        provider_period: None,
        stripe_customer_id: None,
        stripe_subscription_id: None,
    }
}

#[tokio::test]
async fn lifetime_starter_purchase_grants_three_credits() {
    let fx = Fixture::new();

    // Checkout first: one-time mode, no local state yet.
    let session = fx
        .checkout()
        .handle(StartCheckoutCommand {
            user_id: user(),
            plan_id: PlanId::new("starter-plan").unwrap(),
            customer_email: Some("user@example.com".to_string()),
            success_url: "https://app.test/success".to_string(),
            cancel_url: "https://app.test/pricing".to_string(),
        })
        .await
        .unwrap();
    assert!(!session.url.is_empty());
    assert!(fx.store.find_by_user(&user()).await.unwrap().is_none());

    // Payment confirmed: entitlement appears with the sentinel period end.
    let entitlement = fx.confirm().handle(confirm_cmd("starter-plan")).await.unwrap();
    assert_eq!(entitlement.current_period_end, lifetime_period_end());

    let snapshot = fx
        .usage()
        .handle(GetUsageQuery { user_id: user() })
        .await
        .unwrap();
    assert!(snapshot.has_subscription);
    assert_eq!(snapshot.remaining, 3);
    assert_eq!(snapshot.allowance, CreditAllowance::Limited(3));
}

#[tokio::test]
async fn fourth_consume_is_denied_and_usage_reports_zero_remaining() {
    let fx = Fixture::new();
    fx.confirm().handle(confirm_cmd("starter-plan")).await.unwrap();

    let consume = fx.consume();
    for _ in 0..3 {
        let outcome = consume
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();
        assert!(outcome.is_consumed());
    }

    let fourth = consume
        .handle(ConsumeCreditCommand { user_id: user() })
        .await
        .unwrap();
    match fourth {
        ConsumeOutcome::Denied { reason, snapshot } => {
            assert_eq!(reason, DenialReason::LimitExceeded);
            assert_eq!(snapshot.remaining, 0);
        }
        other => panic!("expected denial, got {:?}", other),
    }

    let snapshot = fx
        .usage()
        .handle(GetUsageQuery { user_id: user() })
        .await
        .unwrap();
    assert_eq!(snapshot.remaining, 0);
}

#[tokio::test]
async fn stale_reset_mark_restores_full_allowance_on_next_read() {
    let fx = Fixture::new();
    fx.confirm().handle(confirm_cmd("pro-monthly")).await.unwrap();

    // Burn some credits, then age the reset mark past `now` while keeping
    // the period open.
    let consume = fx.consume();
    for _ in 0..5 {
        consume
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();
    }
    let mut entitlement = fx.store.find_by_user(&user()).await.unwrap().unwrap();
    assert_eq!(entitlement.usage_count, 5);
    entitlement.usage_reset_at = Timestamp::now().minus_days(1);
    entitlement.current_period_end = Timestamp::now().add_days(20);
    fx.store.update(&entitlement).await.unwrap();

    let snapshot = fx
        .usage()
        .handle(GetUsageQuery { user_id: user() })
        .await
        .unwrap();
    assert_eq!(snapshot.usage_count, 0);
    assert_eq!(snapshot.remaining, 30);

    // The durable row was reset too, not just the returned snapshot.
    let persisted = fx.store.find_by_user(&user()).await.unwrap().unwrap();
    assert_eq!(persisted.usage_count, 0);
    assert_eq!(persisted.usage_reset_at, persisted.current_period_end);
}

#[tokio::test]
async fn confirm_payment_twice_is_idempotent() {
    let fx = Fixture::new();
    let confirm = fx.confirm();

    let first = confirm.handle(confirm_cmd("starter-plan")).await.unwrap();
    let second = confirm.handle(confirm_cmd("starter-plan")).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.usage_count, 0);
    assert_eq!(second.plan_id, first.plan_id);
    assert_eq!(second.current_period_end, first.current_period_end);

    // Still exactly one row for the user.
    let row = fx.store.find_by_user(&user()).await.unwrap().unwrap();
    assert_eq!(row.id, first.id);
}

#[tokio::test]
async fn plan_switch_restarts_the_counter() {
    let fx = Fixture::new();
    let confirm = fx.confirm();

    confirm.handle(confirm_cmd("starter-plan")).await.unwrap();
    fx.consume()
        .handle(ConsumeCreditCommand { user_id: user() })
        .await
        .unwrap();

    confirm.handle(confirm_cmd("pro-monthly")).await.unwrap();

    let snapshot = fx
        .usage()
        .handle(GetUsageQuery { user_id: user() })
        .await
        .unwrap();
    assert_eq!(snapshot.usage_count, 0);
    assert_eq!(snapshot.remaining, 30);
}

#[tokio::test]
async fn concurrent_consumes_grant_exactly_the_last_credit_once() {
    let fx = Fixture::new();
    fx.confirm().handle(confirm_cmd("starter-plan")).await.unwrap();

    // Use up all but one credit.
    let consume = Arc::new(fx.consume());
    for _ in 0..2 {
        consume
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();
    }

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let handler = consume.clone();
        tasks.push(tokio::spawn(async move {
            handler
                .handle(ConsumeCreditCommand { user_id: user() })
                .await
                .unwrap()
        }));
    }

    let mut granted = 0;
    for task in tasks {
        if task.await.unwrap().is_consumed() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);

    let row = fx.store.find_by_user(&user()).await.unwrap().unwrap();
    assert_eq!(row.usage_count, 3);
}

#[tokio::test]
async fn unlimited_plan_never_denies() {
    let fx = Fixture::new();
    fx.confirm()
        .handle(confirm_cmd("lifetime-unlimited"))
        .await
        .unwrap();

    let consume = fx.consume();
    for _ in 0..50 {
        let outcome = consume
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();
        assert!(outcome.is_consumed());
        assert!(outcome.snapshot().allowance.is_unlimited());
    }
}

#[tokio::test]
async fn unlimited_plan_consumes_never_touch_the_counter() {
    let fx = Fixture::new();
    fx.confirm()
        .handle(confirm_cmd("lifetime-unlimited"))
        .await
        .unwrap();

    let consume = fx.consume();
    for _ in 0..10 {
        let outcome = consume
            .handle(ConsumeCreditCommand { user_id: user() })
            .await
            .unwrap();
        assert!(outcome.is_consumed());
        assert_eq!(outcome.snapshot().usage_count, 0);
    }

    // The durable row is untouched: no writes happen on the unlimited tier.
    let row = fx.store.find_by_user(&user()).await.unwrap().unwrap();
    assert_eq!(row.usage_count, 0);
}

#[tokio::test]
async fn checkout_pricing_comes_from_the_stored_plan() {
    let fx = Fixture::new();

    fx.checkout()
        .handle(StartCheckoutCommand {
            user_id: user(),
            plan_id: PlanId::new("starter-plan").unwrap(),
            customer_email: None,
            success_url: "https://app.test/success".to_string(),
            cancel_url: "https://app.test/pricing".to_string(),
        })
        .await
        .unwrap();

    let requests = fx.provider.checkout_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].plan.price_cents, 900);
    assert_eq!(requests[0].plan.currency, "usd");
}
