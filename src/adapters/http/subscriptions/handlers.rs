//! HTTP handlers for subscription endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{debug, warn};

use crate::application::handlers::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, ConfirmPaymentCommand,
    ConfirmPaymentHandler, GetCurrentSubscriptionHandler, GetCurrentSubscriptionQuery,
    GetUsageHandler, GetUsageQuery, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
    ListPlansHandler, StartCheckoutCommand, StartCheckoutHandler, WebhookDisposition,
};
use crate::domain::billing::{BillingError, UsageSnapshot};
use crate::domain::foundation::{PlanId, UserId};
use crate::ports::{EntitlementStore, PaymentProvider, PlanCatalog, SessionValidator};

use super::dto::{
    CancelResponse, CheckoutRequest, CheckoutResponse, ConfirmPaymentRequest,
    ConfirmPaymentResponse, CurrentSubscriptionResponse, ErrorResponse, PlanResponse,
    PlanSummaryResponse, PlansResponse, SubscriptionViewResponse, UsageResponse,
    WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// This struct is cloned for each request and contains Arc-wrapped dependencies
/// for efficient sharing across handlers.
#[derive(Clone)]
pub struct SubscriptionsAppState {
    pub entitlement_store: Arc<dyn EntitlementStore>,
    pub plan_catalog: Arc<dyn PlanCatalog>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub session_validator: Arc<dyn SessionValidator>,
    /// Redirect target after a completed checkout, used when the client
    /// supplies none.
    pub checkout_success_url: String,
    /// Redirect target after an abandoned checkout.
    pub checkout_cancel_url: String,
}

impl SubscriptionsAppState {
    /// Create handlers on demand from the shared state.
    pub fn list_plans_handler(&self) -> ListPlansHandler {
        ListPlansHandler::new(self.plan_catalog.clone())
    }

    pub fn current_subscription_handler(&self) -> GetCurrentSubscriptionHandler {
        GetCurrentSubscriptionHandler::new(
            self.entitlement_store.clone(),
            self.plan_catalog.clone(),
        )
    }

    pub fn usage_handler(&self) -> GetUsageHandler {
        GetUsageHandler::new(self.entitlement_store.clone(), self.plan_catalog.clone())
    }

    pub fn checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.plan_catalog.clone(),
            self.entitlement_store.clone(),
            self.payment_provider.clone(),
        )
    }

    pub fn confirm_payment_handler(&self) -> ConfirmPaymentHandler {
        ConfirmPaymentHandler::new(self.entitlement_store.clone(), self.plan_catalog.clone())
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            self.entitlement_store.clone(),
            self.payment_provider.clone(),
        )
    }

    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            self.entitlement_store.clone(),
            self.plan_catalog.clone(),
            self.payment_provider.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Authentication Extractors
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from the `Authorization` header.
///
/// The bearer token is resolved through the session validator port; expired
/// and unknown tokens are indistinguishable and both reject with 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

fn bearer_token(parts: &axum::http::request::Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl axum::extract::FromRequestParts<SubscriptionsAppState> for AuthenticatedUser {
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        state: &'life1 SubscriptionsAppState,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token = bearer_token(parts).ok_or(AuthenticationRequired)?;

            let resolved = state.session_validator.resolve(token).await.map_err(|e| {
                warn!(error = %e, "session lookup failed, treating as unauthenticated");
                AuthenticationRequired
            })?;

            let user_id = resolved.ok_or(AuthenticationRequired)?;
            Ok(AuthenticatedUser { user_id })
        })
    }
}

/// Optional variant of [`AuthenticatedUser`] for endpoints that degrade to an
/// anonymous view instead of rejecting. Never fails extraction.
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<UserId>);

impl axum::extract::FromRequestParts<SubscriptionsAppState> for MaybeAuthenticated {
    type Rejection = std::convert::Infallible;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        state: &'life1 SubscriptionsAppState,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user_id = match bearer_token(parts) {
                Some(token) => state
                    .session_validator
                    .resolve(token)
                    .await
                    .ok()
                    .flatten(),
                None => None,
            };
            Ok(MaybeAuthenticated(user_id))
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/subscriptions/plans - List active plans for the pricing page
pub async fn list_plans(
    State(state): State<SubscriptionsAppState>,
) -> Result<impl IntoResponse, ApiError> {
    let handler = state.list_plans_handler();
    let plans = handler.handle().await?;

    let response = PlansResponse {
        plans: plans.into_iter().map(PlanResponse::from).collect(),
    };

    Ok(Json(response))
}

/// GET /api/subscriptions/current - Get current user's subscription details
pub async fn get_current_subscription(
    State(state): State<SubscriptionsAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let handler = state.current_subscription_handler();
    let query = GetCurrentSubscriptionQuery {
        user_id: user.user_id,
    };

    let result = handler.handle(query).await?;

    let response = CurrentSubscriptionResponse {
        subscription: result.map(SubscriptionViewResponse::from),
    };

    Ok(Json(response))
}

/// GET /api/subscriptions/usage - Get current user's credit position
///
/// Works without authentication: anonymous callers get the no-subscription
/// snapshot rather than a 401, since the frontend polls this on every page.
pub async fn get_usage(
    State(state): State<SubscriptionsAppState>,
    maybe_user: MaybeAuthenticated,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = match maybe_user.0 {
        Some(user_id) => {
            let handler = state.usage_handler();
            handler.handle(GetUsageQuery { user_id }).await?
        }
        None => UsageSnapshot::no_subscription(),
    };

    Ok(Json(UsageResponse::from(snapshot)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscriptions/checkout - Start a hosted checkout for a plan
pub async fn create_checkout(
    State(state): State<SubscriptionsAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let plan_id = PlanId::new(&request.plan_id)
        .map_err(|e| BillingError::validation("planId", e.to_string()))?;

    let handler = state.checkout_handler();
    let cmd = StartCheckoutCommand {
        user_id: user.user_id,
        plan_id,
        customer_email: request.email,
        success_url: request
            .success_url
            .unwrap_or_else(|| state.checkout_success_url.clone()),
        cancel_url: request
            .cancel_url
            .unwrap_or_else(|| state.checkout_cancel_url.clone()),
    };

    let session = handler.handle(cmd).await?;

    let response = CheckoutResponse {
        checkout_url: session.url,
        session_id: session.id,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/subscriptions/confirm-payment - Activate the plan after checkout
///
/// Idempotent: the client return page and the provider webhook both land here
/// or in the webhook handler, and replays rewrite the row to the same state.
pub async fn confirm_payment(
    State(state): State<SubscriptionsAppState>,
    user: AuthenticatedUser,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let plan_id = PlanId::new(&request.plan_id)
        .map_err(|e| BillingError::validation("planId", e.to_string()))?;

    let handler = state.confirm_payment_handler();
    let cmd = ConfirmPaymentCommand {
        user_id: user.user_id,
        plan_id,
        provider_period: None,
        stripe_customer_id: None,
        stripe_subscription_id: None,
    };

    let entitlement = handler.handle(cmd).await?;

    let plan = state
        .plan_catalog
        .find_by_id(&entitlement.plan_id)
        .await
        .map_err(BillingError::from)?
        .ok_or_else(|| BillingError::plan_not_found(entitlement.plan_id.clone()))?;

    let message = format!("Payment confirmed. The {} plan is now active.", plan.name);
    let response = ConfirmPaymentResponse {
        success: true,
        plan: PlanSummaryResponse {
            id: plan.id.to_string(),
            name: plan.name,
            monthly_limit: plan.allowance.limit(),
        },
        message,
    };

    Ok(Json(response))
}

/// POST /api/subscriptions/cancel - Cancel at the end of the current period
pub async fn cancel_subscription(
    State(state): State<SubscriptionsAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let handler = state.cancel_subscription_handler();
    let cmd = CancelSubscriptionCommand {
        user_id: user.user_id,
    };

    let entitlement = handler.handle(cmd).await?;

    let response = CancelResponse {
        message: format!(
            "Subscription will end on {}. Access continues until then.",
            entitlement.current_period_end
        ),
    };

    Ok(Json(response))
}

/// POST /api/subscriptions/webhook - Handle payment provider webhook events
pub async fn handle_payment_webhook(
    State(state): State<SubscriptionsAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            BillingError::validation("Stripe-Signature", "Missing Stripe-Signature header")
        })?;

    let handler = state.webhook_handler();
    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    match handler.handle(cmd).await? {
        WebhookDisposition::Processed { event_type } => {
            debug!(event_type = %event_type, "webhook processed");
        }
        WebhookDisposition::Skipped { event_type } => {
            debug!(event_type = %event_type, "webhook acknowledged without action");
        }
    }

    Ok(Json(WebhookAckResponse { received: true }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(BillingError);

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<crate::domain::foundation::DomainError> for ApiError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        Self(BillingError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            BillingError::PlanNotFound(_) | BillingError::NoActiveEntitlement(_) => {
                StatusCode::NOT_FOUND
            }
            BillingError::InvalidState { .. } => StatusCode::CONFLICT,
            BillingError::InvalidWebhookSignature | BillingError::ValidationFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            BillingError::ProviderUnavailable { .. } => StatusCode::BAD_GATEWAY,
            BillingError::ProviderRejected { .. } => StatusCode::PAYMENT_REQUIRED,
            BillingError::ConflictExhausted | BillingError::Infrastructure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse::new(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}
