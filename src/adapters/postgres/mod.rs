//! PostgreSQL adapter implementations.

mod entitlement_store;
mod plan_catalog;
mod session_store;

pub use entitlement_store::PostgresEntitlementStore;
pub use plan_catalog::PostgresPlanCatalog;
pub use session_store::PostgresSessionStore;
