//! Usage metering result types.
//!
//! Denials are ordinary values, not errors: the HTTP surface renders them as
//! 200 responses with `remaining: 0` so the client can always explain why and
//! when credits return.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

use super::CreditAllowance;

/// Snapshot of a user's credit position, as returned by the usage query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Whether an active entitlement exists.
    pub has_subscription: bool,

    /// Credits consumed in the current period.
    pub usage_count: u32,

    /// The plan allowance. `Limited(0)` when no entitlement exists.
    pub allowance: CreditAllowance,

    /// Credits left. Zero when no entitlement; `u32::MAX` is never used as a
    /// sentinel - unlimited plans report their remaining as `None` upstream
    /// and are rendered separately.
    pub remaining: u32,

    /// When the counter next resets, if a subscription exists.
    pub reset_at: Option<Timestamp>,
}

impl UsageSnapshot {
    /// The snapshot reported for users without an active entitlement.
    pub fn no_subscription() -> Self {
        Self {
            has_subscription: false,
            usage_count: 0,
            allowance: CreditAllowance::Limited(0),
            remaining: 0,
            reset_at: None,
        }
    }

    /// Builds a snapshot from an entitlement's counter and its plan allowance.
    pub fn from_counter(usage_count: u32, allowance: CreditAllowance, reset_at: Timestamp) -> Self {
        let remaining = match allowance.remaining_after(usage_count) {
            Some(n) => n,
            // Unlimited plans always have headroom; the DTO layer renders
            // the allowance variant, not this number.
            None => u32::MAX,
        };
        Self {
            has_subscription: true,
            usage_count,
            allowance,
            remaining,
            reset_at: Some(reset_at),
        }
    }
}

/// Why a consumption request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// No active entitlement exists for the user.
    NoEntitlement,
    /// The period allowance is exhausted.
    LimitExceeded,
}

/// Outcome of a consumption attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumeOutcome {
    /// One credit was consumed; `snapshot` reflects the state after the write.
    Consumed { snapshot: UsageSnapshot },
    /// The request was denied; `snapshot` explains the current position.
    Denied {
        reason: DenialReason,
        snapshot: UsageSnapshot,
    },
}

impl ConsumeOutcome {
    /// True if a credit was granted.
    pub fn is_consumed(&self) -> bool {
        matches!(self, ConsumeOutcome::Consumed { .. })
    }

    /// The snapshot carried by either variant.
    pub fn snapshot(&self) -> &UsageSnapshot {
        match self {
            ConsumeOutcome::Consumed { snapshot } => snapshot,
            ConsumeOutcome::Denied { snapshot, .. } => snapshot,
        }
    }
}
