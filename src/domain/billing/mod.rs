//! Billing domain - plans, entitlements, and credit metering.
//!
//! This is the core of the service: the state-transition logic that turns
//! confirmed payments into entitlement records and meters consumption of
//! optimization credits against them.

mod entitlement;
mod errors;
mod plan;
mod status;
mod usage;

pub use entitlement::{Entitlement, PeriodWindow};
pub use errors::BillingError;
pub use plan::{lifetime_period_end, CreditAllowance, Plan, PlanInterval};
pub use status::EntitlementStatus;
pub use usage::{ConsumeOutcome, DenialReason, UsageSnapshot};
