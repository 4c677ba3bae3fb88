//! Entitlement aggregate entity.
//!
//! An entitlement is the record of what a user is currently allowed to
//! consume, tied to a plan and a time window. Each user has at most one
//! active entitlement, enforced by a partial unique index at the database
//! level.
//!
//! # Design Decisions
//!
//! - **Never deleted**: rows transition to cancelled/expired instead
//! - **Reset is a set, not an increment**: confirming a payment always lands
//!   on `usage_count = 0`, which is what makes reconciliation idempotent
//! - **Counter writes are conditional**: the aggregate mirrors the counter,
//!   but the authoritative increment is the store's compare-and-set

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, EntitlementId, PlanId, Timestamp, UserId};

use super::{EntitlementStatus, Plan, PlanInterval};

/// A billing period window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl PeriodWindow {
    /// Computes the window locally from the plan interval.
    ///
    /// Used for one-time payments and client-side confirmation, where no
    /// provider-reported period exists.
    pub fn compute(interval: PlanInterval, now: Timestamp) -> Self {
        Self {
            start: now,
            end: interval.period_end_from(now),
        }
    }

    /// Builds a window from provider-reported Unix timestamps.
    ///
    /// Preferred for true recurring subscriptions confirmed via webhook, so
    /// the local window matches what the customer was actually billed for.
    pub fn from_provider(start_unix: i64, end_unix: i64) -> Self {
        Self {
            start: Timestamp::from_unix_secs(start_unix),
            end: Timestamp::from_unix_secs(end_unix),
        }
    }
}

/// Entitlement aggregate - one user's subscription and credit state.
///
/// # Invariants
///
/// - At most one row with status `active` per user
/// - `usage_count` never goes negative (it is unsigned) and is bounded by
///   the plan allowance at read/reset time
/// - Lifetime plans carry the far-future sentinel as `current_period_end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Unique identifier for this entitlement.
    pub id: EntitlementId,

    /// User who owns this entitlement.
    pub user_id: UserId,

    /// Plan the entitlement was purchased under.
    pub plan_id: PlanId,

    /// Current lifecycle status.
    pub status: EntitlementStatus,

    /// Start of the current billing period.
    pub current_period_start: Timestamp,

    /// End of the current billing period.
    pub current_period_end: Timestamp,

    /// Whether the subscription ends (rather than renews) at period end.
    pub cancel_at_period_end: bool,

    /// Credits consumed in the current period.
    pub usage_count: u32,

    /// When the counter next resets. Advanced lazily on read/consume.
    pub usage_reset_at: Timestamp,

    /// Stripe customer reference (recurring plans only).
    pub stripe_customer_id: Option<String>,

    /// Stripe subscription reference (recurring plans only).
    pub stripe_subscription_id: Option<String>,

    /// When the entitlement was created.
    pub created_at: Timestamp,

    /// When the entitlement was last updated.
    pub updated_at: Timestamp,
}

impl Entitlement {
    /// Creates a fresh active entitlement from a confirmed payment.
    pub fn activate_new(id: EntitlementId, user_id: UserId, plan: &Plan, period: PeriodWindow) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            user_id,
            plan_id: plan.id.clone(),
            status: EntitlementStatus::Active,
            current_period_start: period.start,
            current_period_end: period.end,
            cancel_at_period_end: false,
            usage_count: 0,
            usage_reset_at: period.end,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Re-activates this entitlement for a confirmed payment.
    ///
    /// Switching plans deliberately restarts the counter: the usage count is
    /// reset to zero regardless of what remained on the previous plan.
    ///
    /// # Errors
    ///
    /// Returns error if the status transition is not allowed (it always is,
    /// payment re-activates any state; kept as a Result so the state machine
    /// stays the single authority).
    pub fn activate_for_plan(&mut self, plan: &Plan, period: PeriodWindow) -> Result<(), DomainError> {
        self.status = self.status.transition_to(EntitlementStatus::Active)?;
        self.plan_id = plan.id.clone();
        self.current_period_start = period.start;
        self.current_period_end = period.end;
        self.cancel_at_period_end = false;
        self.usage_count = 0;
        self.usage_reset_at = period.end;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Whether the lazy reset is due.
    pub fn reset_due(&self, now: Timestamp) -> bool {
        now.is_after(&self.usage_reset_at)
    }

    /// Applies the lazy reset: zero the counter and advance the reset mark
    /// to the period end.
    ///
    /// Advancing to `current_period_end` (not `now + period`) keeps the
    /// reset anchored to the paid period. Idempotent between period
    /// boundaries: once `usage_reset_at == current_period_end` and that
    /// instant is in the future, `reset_due` stays false.
    pub fn apply_lazy_reset(&mut self) {
        self.usage_count = 0;
        self.usage_reset_at = self.current_period_end;
        self.updated_at = Timestamp::now();
    }

    /// Records one consumed credit on the in-memory aggregate.
    ///
    /// The durable increment is the store's compare-and-set keyed on the
    /// observed count; this mirror keeps the aggregate consistent for the
    /// caller after a successful write.
    pub fn record_consumption(&mut self) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.updated_at = Timestamp::now();
    }

    /// Marks the subscription to end at the period boundary.
    pub fn request_cancellation(&mut self) {
        self.cancel_at_period_end = true;
        self.updated_at = Timestamp::now();
    }

    /// Transitions to cancelled (provider deleted the subscription).
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.status = self.status.transition_to(EntitlementStatus::Cancelled)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Marks payment as past due (failed but in grace period).
    pub fn mark_past_due(&mut self) -> Result<(), DomainError> {
        self.status = self.status.transition_to(EntitlementStatus::PastDue)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Marks the entitlement as expired.
    pub fn expire(&mut self) -> Result<(), DomainError> {
        self.status = self.status.transition_to(EntitlementStatus::Expired)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Attaches Stripe references after a recurring checkout completes.
    pub fn attach_stripe_refs(
        &mut self,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    ) {
        if customer_id.is_some() {
            self.stripe_customer_id = customer_id;
        }
        if subscription_id.is_some() {
            self.stripe_subscription_id = subscription_id;
        }
        self.updated_at = Timestamp::now();
    }
}
