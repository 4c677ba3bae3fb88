//! Axum router configuration for subscription endpoints.
//!
//! This module defines the route structure for billing-related API endpoints
//! and wires them to their corresponding handlers.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    cancel_subscription, confirm_payment, create_checkout, get_current_subscription, get_usage,
    handle_payment_webhook, list_plans, SubscriptionsAppState,
};

/// Create the subscriptions API router.
///
/// # Routes
///
/// ## Public Endpoints
/// - `GET /plans` - List active plans
/// - `GET /usage` - Credit position (degrades to anonymous view without auth)
///
/// ## User Endpoints (require authentication)
/// - `GET /current` - Get current user's subscription details
/// - `POST /checkout` - Start a hosted checkout flow
/// - `POST /confirm-payment` - Activate the plan after checkout returns
/// - `POST /cancel` - Cancel at period end
pub fn subscription_routes() -> Router<SubscriptionsAppState> {
    Router::new()
        // Public endpoints
        .route("/plans", get(list_plans))
        .route("/usage", get(get_usage))
        // User endpoints
        .route("/current", get(get_current_subscription))
        .route("/checkout", post(create_checkout))
        .route("/confirm-payment", post(confirm_payment))
        .route("/cancel", post(cancel_subscription))
}

/// Create the payment webhook router.
///
/// This is separate from the main subscription routes because webhooks
/// don't require user authentication (they're verified via signature).
///
/// # Routes
/// - `POST /webhook` - Handle payment provider webhooks
pub fn webhook_routes() -> Router<SubscriptionsAppState> {
    Router::new().route("/webhook", post(handle_payment_webhook))
}

/// Create the complete subscriptions module router.
///
/// Suitable for nesting at `/api`:
///
/// ```ignore
/// let app = Router::new()
///     .nest("/api/subscriptions", subscriptions_router())
///     .with_state(app_state);
/// ```
pub fn subscriptions_router() -> Router<SubscriptionsAppState> {
    Router::new()
        .merge(subscription_routes())
        .merge(webhook_routes())
}
