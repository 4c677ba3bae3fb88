//! Ports - interfaces between the application core and the outside world.
//!
//! Adapters (postgres, stripe, memory) implement these traits; application
//! handlers depend only on the traits.

mod entitlement_store;
mod payment_provider;
mod plan_catalog;
mod session_validator;

pub use entitlement_store::EntitlementStore;
pub use payment_provider::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentProvider, ProviderSubscription,
    ProviderSubscriptionStatus, WebhookEvent, WebhookEventKind,
};
pub use plan_catalog::PlanCatalog;
pub use session_validator::SessionValidator;
