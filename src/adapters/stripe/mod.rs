//! Stripe adapter - payment provider integration.

mod mock_payment_provider;
mod stripe_adapter;
pub mod webhook_types;

pub use mock_payment_provider::MockPaymentProvider;
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
