//! Billing-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | PlanNotFound | 404 |
//! | NoActiveEntitlement | 404 |
//! | InvalidState | 409 |
//! | InvalidWebhookSignature | 400 |
//! | ProviderUnavailable | 502 |
//! | ProviderRejected | 402 |
//! | ValidationFailed | 400 |
//! | ConflictExhausted | 500 (internal retry already applied) |
//! | Infrastructure | 500 |
//!
//! Usage denials (`NoEntitlement`/`LimitExceeded`) are deliberately not in
//! this enum - they are ordinary outcomes, see
//! [`super::ConsumeOutcome`].

use crate::domain::foundation::{DomainError, ErrorCode, PlanId, UserId};

/// Billing-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// The referenced plan does not exist or is inactive.
    PlanNotFound(PlanId),

    /// No active entitlement exists for this user.
    NoActiveEntitlement(UserId),

    /// Invalid state for the requested operation.
    InvalidState { current: String, attempted: String },

    /// Webhook signature verification failed; no state was touched.
    InvalidWebhookSignature,

    /// The payment provider timed out or returned a 5xx. Safe to retry.
    ProviderUnavailable { reason: String },

    /// The payment provider rejected the request. Not retryable.
    ProviderRejected { reason: String },

    /// Request validation failed.
    ValidationFailed { field: String, message: String },

    /// A compare-and-set write lost its race even after the internal retry.
    ConflictExhausted,

    /// Infrastructure error.
    Infrastructure(String),
}

impl BillingError {
    pub fn plan_not_found(plan_id: PlanId) -> Self {
        BillingError::PlanNotFound(plan_id)
    }

    pub fn no_active_entitlement(user_id: UserId) -> Self {
        BillingError::NoActiveEntitlement(user_id)
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        BillingError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn provider_unavailable(reason: impl Into<String>) -> Self {
        BillingError::ProviderUnavailable {
            reason: reason.into(),
        }
    }

    pub fn provider_rejected(reason: impl Into<String>) -> Self {
        BillingError::ProviderRejected {
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        BillingError::Infrastructure(message.into())
    }

    /// True if the caller may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::ProviderUnavailable { .. } | BillingError::Infrastructure(_)
        )
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::PlanNotFound(_) => "PLAN_NOT_FOUND",
            BillingError::NoActiveEntitlement(_) => "NO_ACTIVE_SUBSCRIPTION",
            BillingError::InvalidState { .. } => "INVALID_STATE",
            BillingError::InvalidWebhookSignature => "SIGNATURE_INVALID",
            BillingError::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            BillingError::ProviderRejected { .. } => "PROVIDER_REJECTED",
            BillingError::ValidationFailed { .. } => "VALIDATION_FAILED",
            BillingError::ConflictExhausted => "CONFLICT_EXHAUSTED",
            BillingError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingError::PlanNotFound(id) => write!(f, "Plan not found: {}", id),
            BillingError::NoActiveEntitlement(user) => {
                write!(f, "No active subscription for user {}", user)
            }
            BillingError::InvalidState { current, attempted } => {
                write!(f, "Cannot {} while {}", attempted, current)
            }
            BillingError::InvalidWebhookSignature => {
                write!(f, "Webhook signature verification failed")
            }
            BillingError::ProviderUnavailable { reason } => {
                write!(f, "Payment provider unavailable: {}", reason)
            }
            BillingError::ProviderRejected { reason } => {
                write!(f, "Payment provider rejected the request: {}", reason)
            }
            BillingError::ValidationFailed { field, message } => {
                write!(f, "Validation failed for '{}': {}", field, message)
            }
            BillingError::ConflictExhausted => {
                write!(f, "Concurrent update conflict, retry exhausted")
            }
            BillingError::Infrastructure(msg) => write!(f, "Infrastructure error: {}", msg),
        }
    }
}

impl std::error::Error for BillingError {}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::InvalidStateTransition => BillingError::InvalidState {
                current: err.message.clone(),
                attempted: String::new(),
            },
            ErrorCode::ProviderUnavailable => BillingError::provider_unavailable(err.message),
            ErrorCode::SignatureInvalid => BillingError::InvalidWebhookSignature,
            _ => BillingError::Infrastructure(err.to_string()),
        }
    }
}
