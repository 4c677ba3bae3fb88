//! Plan catalog entry.
//!
//! Plans are seeded by an administrative process and are read-only from the
//! core's perspective. Prices are stored in minor units (cents); the charged
//! amount is always derived from the stored plan, never from client input.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PlanId, Timestamp};

/// Far-future period end used for lifetime plans instead of a computed window.
static LIFETIME_PERIOD_END: Lazy<Timestamp> = Lazy::new(|| {
    let dt = chrono::DateTime::parse_from_rfc3339("2099-12-31T00:00:00Z")
        .expect("lifetime sentinel is a valid RFC3339 timestamp")
        .with_timezone(&chrono::Utc);
    Timestamp::from_datetime(dt)
});

/// Returns the sentinel period end used for lifetime plans.
pub fn lifetime_period_end() -> Timestamp {
    *LIFETIME_PERIOD_END
}

/// Billing interval of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanInterval {
    Month,
    Year,
    Lifetime,
}

impl PlanInterval {
    /// True for intervals billed through a recurring Stripe subscription.
    ///
    /// Lifetime plans are one-time payments.
    pub fn is_recurring(&self) -> bool {
        !matches!(self, PlanInterval::Lifetime)
    }

    /// The Stripe recurring interval parameter for this plan, if any.
    pub fn stripe_interval(&self) -> Option<&'static str> {
        match self {
            PlanInterval::Month => Some("month"),
            PlanInterval::Year => Some("year"),
            PlanInterval::Lifetime => None,
        }
    }

    /// Computes the period end for a window starting at `start`.
    ///
    /// Monthly plans get 30 days, annual plans 365 days, lifetime plans the
    /// far-future sentinel.
    pub fn period_end_from(&self, start: Timestamp) -> Timestamp {
        match self {
            PlanInterval::Month => start.add_days(30),
            PlanInterval::Year => start.add_days(365),
            PlanInterval::Lifetime => lifetime_period_end(),
        }
    }

    /// Database column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanInterval::Month => "month",
            PlanInterval::Year => "year",
            PlanInterval::Lifetime => "lifetime",
        }
    }

    /// Parses a database column value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "month" => Some(PlanInterval::Month),
            "year" => Some(PlanInterval::Year),
            "lifetime" => Some(PlanInterval::Lifetime),
            _ => None,
        }
    }
}

/// Credits granted per billing period.
///
/// `Limited(0)` means "no credits", so the unlimited tier is a distinct
/// variant rather than a magic numeric value. Persistence maps `Unlimited`
/// to the reserved column value `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditAllowance {
    Limited(u32),
    Unlimited,
}

impl CreditAllowance {
    /// Reserved database value for the unlimited tier.
    const UNLIMITED_COLUMN: i64 = -1;

    /// Credits left after `usage_count` consumptions, saturating at zero.
    ///
    /// Unlimited allowances report `None` (no meaningful remainder).
    pub fn remaining_after(&self, usage_count: u32) -> Option<u32> {
        match self {
            CreditAllowance::Limited(limit) => Some(limit.saturating_sub(usage_count)),
            CreditAllowance::Unlimited => None,
        }
    }

    /// True if consumption should bypass the counter entirely.
    pub fn is_unlimited(&self) -> bool {
        matches!(self, CreditAllowance::Unlimited)
    }

    /// The numeric limit for display, 0 when unlimited is rendered elsewhere.
    pub fn limit(&self) -> Option<u32> {
        match self {
            CreditAllowance::Limited(limit) => Some(*limit),
            CreditAllowance::Unlimited => None,
        }
    }

    /// Database column value.
    pub fn as_column(&self) -> i64 {
        match self {
            CreditAllowance::Limited(limit) => i64::from(*limit),
            CreditAllowance::Unlimited => Self::UNLIMITED_COLUMN,
        }
    }

    /// Parses a database column value.
    ///
    /// Negative values other than the reserved sentinel are rejected.
    pub fn from_column(value: i64) -> Option<Self> {
        match value {
            Self::UNLIMITED_COLUMN => Some(CreditAllowance::Unlimited),
            v if v >= 0 => u32::try_from(v).ok().map(CreditAllowance::Limited),
            _ => None,
        }
    }
}

/// Immutable catalog entry describing a purchasable plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Catalog slug, e.g. `starter-plan`.
    pub id: PlanId,

    /// Display name shown at checkout and on confirmation.
    pub name: String,

    /// Optional marketing description.
    pub description: Option<String>,

    /// Price in minor units of `currency`.
    pub price_cents: i64,

    /// ISO currency code, e.g. `USD`.
    pub currency: String,

    /// Billing interval.
    pub interval: PlanInterval,

    /// Optimization credits granted per period.
    pub allowance: CreditAllowance,

    /// Whether the plan is currently purchasable.
    pub active: bool,

    /// When the plan was created.
    pub created_at: Timestamp,

    /// When the plan was last updated.
    pub updated_at: Timestamp,
}

impl Plan {
    /// Stripe checkout mode for this plan.
    pub fn checkout_mode(&self) -> &'static str {
        if self.interval.is_recurring() {
            "subscription"
        } else {
            "payment"
        }
    }
}
