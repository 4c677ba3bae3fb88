//! Entitlement status lifecycle.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode};

/// Status of an entitlement in the subscription lifecycle.
///
/// # State machine
///
/// ```text
///   Active ──> Cancelled ──> Expired
///     │  ^                      │
///     │  └── (payment) ─────────┘
///     └──> PastDue ──> Active | Cancelled | Expired
/// ```
///
/// A confirmed payment may re-activate any state: the reconciler is the
/// single place where "a payment succeeded" becomes "the user has credits",
/// and repurchase after expiry is always allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    Active,
    Cancelled,
    Expired,
    PastDue,
}

impl EntitlementStatus {
    /// Whether this status currently grants consumption rights.
    pub fn grants_access(&self) -> bool {
        matches!(self, EntitlementStatus::Active)
    }

    /// Whether a transition to `target` is allowed.
    pub fn can_transition_to(&self, target: EntitlementStatus) -> bool {
        use EntitlementStatus::*;
        match (self, target) {
            // Payment confirmation re-activates from any state; renewal is
            // Active -> Active.
            (_, Active) => true,
            (Active | PastDue, Cancelled) => true,
            (Active | Cancelled | PastDue, Expired) => true,
            (Active, PastDue) => true,
            _ => false,
        }
    }

    /// Performs a checked transition.
    pub fn transition_to(self, target: EntitlementStatus) -> Result<EntitlementStatus, DomainError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot transition entitlement from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Database column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementStatus::Active => "active",
            EntitlementStatus::Cancelled => "cancelled",
            EntitlementStatus::Expired => "expired",
            EntitlementStatus::PastDue => "past_due",
        }
    }

    /// Parses a database column value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(EntitlementStatus::Active),
            "cancelled" => Some(EntitlementStatus::Cancelled),
            "expired" => Some(EntitlementStatus::Expired),
            "past_due" => Some(EntitlementStatus::PastDue),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_grants_access() {
        assert!(EntitlementStatus::Active.grants_access());
        assert!(!EntitlementStatus::Cancelled.grants_access());
        assert!(!EntitlementStatus::Expired.grants_access());
        assert!(!EntitlementStatus::PastDue.grants_access());
    }

    #[test]
    fn payment_reactivates_any_state() {
        for status in [
            EntitlementStatus::Active,
            EntitlementStatus::Cancelled,
            EntitlementStatus::Expired,
            EntitlementStatus::PastDue,
        ] {
            assert!(status.can_transition_to(EntitlementStatus::Active));
        }
    }

    #[test]
    fn expired_cannot_go_past_due() {
        assert!(!EntitlementStatus::Expired.can_transition_to(EntitlementStatus::PastDue));
        assert!(EntitlementStatus::Expired
            .transition_to(EntitlementStatus::PastDue)
            .is_err());
    }

    #[test]
    fn cancelled_cannot_be_recancelled() {
        assert!(!EntitlementStatus::Cancelled.can_transition_to(EntitlementStatus::Cancelled));
    }

    #[test]
    fn status_roundtrips_through_column_value() {
        for status in [
            EntitlementStatus::Active,
            EntitlementStatus::Cancelled,
            EntitlementStatus::Expired,
            EntitlementStatus::PastDue,
        ] {
            assert_eq!(EntitlementStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EntitlementStatus::parse("paused"), None);
    }
}
