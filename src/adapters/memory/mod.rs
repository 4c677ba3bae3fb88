//! In-memory adapter implementations.
//!
//! Back the catalog and store ports with process-local state. Used by
//! handler unit tests and the integration suite; the compare-and-set
//! semantics match the PostgreSQL adapter exactly.

mod entitlement_store;
mod plan_catalog;
mod session_validator;

pub use entitlement_store::InMemoryEntitlementStore;
pub use plan_catalog::InMemoryPlanCatalog;
pub use session_validator::InMemorySessionValidator;
