//! HTTP adapter for subscription endpoints.
//!
//! Exposes the billing core via REST API:
//! - `GET /api/subscriptions/plans` - List active plans
//! - `GET /api/subscriptions/current` - Get current user's subscription
//! - `GET /api/subscriptions/usage` - Get credit position (lazy reset side effect)
//! - `POST /api/subscriptions/checkout` - Start a hosted checkout flow
//! - `POST /api/subscriptions/confirm-payment` - Activate after checkout returns
//! - `POST /api/subscriptions/cancel` - Cancel at period end
//! - `POST /api/subscriptions/webhook` - Handle payment provider webhooks

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, AuthenticatedUser, MaybeAuthenticated, SubscriptionsAppState};
pub use routes::{subscription_routes, subscriptions_router, webhook_routes};
