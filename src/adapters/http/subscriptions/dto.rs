//! HTTP DTOs (Data Transfer Objects) for subscription endpoints.
//!
//! These types define the JSON request/response structure for the billing API.
//! Field names are camelCase on the wire; the frontend consumes them directly.

use serde::{Deserialize, Serialize};

use crate::application::handlers::CurrentSubscription;
use crate::domain::billing::{Plan, UsageSnapshot};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a hosted checkout.
///
/// Only the plan id is trusted; pricing always comes from the stored plan.
/// Redirect URLs default to the server-configured pair when omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub plan_id: String,
    /// Email to prefill on the provider's checkout page.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

/// Request to confirm a completed payment from the client-side return page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub plan_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// A catalog plan as rendered on the pricing page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub interval: String,
    /// Credits per period; `null` for unlimited plans.
    pub monthly_limit: Option<u32>,
    pub unlimited: bool,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        Self {
            id: plan.id.to_string(),
            name: plan.name,
            description: plan.description,
            price_cents: plan.price_cents,
            currency: plan.currency,
            interval: plan.interval.as_str().to_string(),
            monthly_limit: plan.allowance.limit(),
            unlimited: plan.allowance.is_unlimited(),
        }
    }
}

/// Response for the plan listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlansResponse {
    pub plans: Vec<PlanResponse>,
}

/// The caller's subscription as rendered on the account page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionViewResponse {
    pub id: String,
    pub plan_id: String,
    /// Plan display name; `null` when the catalog row is gone.
    pub plan_name: Option<String>,
    pub status: String,
    pub cancel_at_period_end: bool,
    pub current_period_start: String,
    pub current_period_end: String,
    pub usage_count: u32,
    pub monthly_limit: Option<u32>,
    pub created_at: String,
}

impl From<CurrentSubscription> for SubscriptionViewResponse {
    fn from(current: CurrentSubscription) -> Self {
        let entitlement = current.entitlement;
        Self {
            id: entitlement.id.to_string(),
            plan_id: entitlement.plan_id.to_string(),
            plan_name: current.plan.as_ref().map(|p| p.name.clone()),
            status: entitlement.status.as_str().to_string(),
            cancel_at_period_end: entitlement.cancel_at_period_end,
            current_period_start: entitlement.current_period_start.as_datetime().to_rfc3339(),
            current_period_end: entitlement.current_period_end.as_datetime().to_rfc3339(),
            usage_count: entitlement.usage_count,
            monthly_limit: current.plan.as_ref().and_then(|p| p.allowance.limit()),
            created_at: entitlement.created_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Response wrapper for the current-subscription query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSubscriptionResponse {
    pub subscription: Option<SubscriptionViewResponse>,
}

/// The caller's credit position.
///
/// Denials are soft: an exhausted or missing subscription is still a 200
/// carrying `remaining: 0` and a `resetDate` when one exists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub has_subscription: bool,
    pub usage_count: u32,
    /// `null` for unlimited plans.
    pub monthly_limit: Option<u32>,
    /// `null` for unlimited plans.
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_date: Option<String>,
}

impl From<UsageSnapshot> for UsageResponse {
    fn from(snapshot: UsageSnapshot) -> Self {
        let remaining = if snapshot.allowance.is_unlimited() {
            None
        } else {
            Some(snapshot.remaining)
        };
        Self {
            has_subscription: snapshot.has_subscription,
            usage_count: snapshot.usage_count,
            monthly_limit: snapshot.allowance.limit(),
            remaining,
            reset_date: snapshot
                .reset_at
                .map(|ts| ts.as_datetime().to_rfc3339()),
        }
    }
}

/// Response for checkout initiation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

/// Short plan summary embedded in the confirmation response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummaryResponse {
    pub id: String,
    pub name: String,
    pub monthly_limit: Option<u32>,
}

/// Response for client-side payment confirmation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentResponse {
    pub success: bool,
    pub plan: PlanSummaryResponse,
    pub message: String,
}

/// Response for cancellation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub message: String,
}

/// Acknowledgement body for the webhook endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAckResponse {
    pub received: bool,
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Response DTO
// ════════════════════════════════════════════════════════════════════════════════

/// Standard error response for API errors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
