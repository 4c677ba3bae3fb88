//! Entitlement store port (write side).
//!
//! The entitlement row for a given user is the only shared mutable resource
//! in the core. Request handlers run in parallel across processes, so every
//! counter mutation goes through a compare-and-set write keyed on the value
//! the handler observed - never a blind overwrite.
//!
//! # Example
//!
//! ```ignore
//! // CAS consumption: increment only if the row still shows the observed
//! // count, then re-read and retry once on a lost race.
//! if !store.try_consume(&ent.id, ent.usage_count).await? {
//!     if let Some(fresh) = store.find_active_by_user(&user_id).await? {
//!         store.try_consume(&fresh.id, fresh.usage_count).await?;
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::domain::billing::Entitlement;
use crate::domain::foundation::{DomainError, EntitlementId, Timestamp, UserId};

/// Durable storage for entitlement records.
///
/// Implementations must ensure:
/// - At most one `active` row per user (partial unique index)
/// - `try_consume` and `try_reset_usage` are atomic conditional writes
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Finds the user's active entitlement, if any.
    async fn find_active_by_user(&self, user_id: &UserId)
        -> Result<Option<Entitlement>, DomainError>;

    /// Finds the user's entitlement row regardless of status.
    ///
    /// The reconciler reuses an existing row (even a cancelled or expired
    /// one) rather than inserting a second.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Entitlement>, DomainError>;

    /// Finds an entitlement by its Stripe subscription reference.
    async fn find_by_stripe_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Entitlement>, DomainError>;

    /// Inserts a new entitlement row.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure, including a violated
    ///   one-active-row-per-user constraint
    async fn insert(&self, entitlement: &Entitlement) -> Result<(), DomainError>;

    /// Updates an existing entitlement row in full.
    ///
    /// Used for reconciliation and status syncs, where the target state is a
    /// deterministic set (idempotent under replays).
    ///
    /// # Errors
    ///
    /// - `EntitlementNotFound` if the row does not exist
    async fn update(&self, entitlement: &Entitlement) -> Result<(), DomainError>;

    /// Atomically increments `usage_count` by one, conditional on the row
    /// still holding `observed_usage`.
    ///
    /// Returns `false` if the condition failed (another request got there
    /// first); callers re-read and retry once before denying.
    async fn try_consume(
        &self,
        id: &EntitlementId,
        observed_usage: u32,
    ) -> Result<bool, DomainError>;

    /// Atomically applies the lazy reset: `usage_count = 0`,
    /// `usage_reset_at = new_reset_at`, conditional on the row still holding
    /// `observed_reset_at`.
    ///
    /// Returns `false` if another request already performed the reset, which
    /// callers treat as success (the reset is idempotent).
    async fn try_reset_usage(
        &self,
        id: &EntitlementId,
        new_reset_at: Timestamp,
        observed_reset_at: Timestamp,
    ) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entitlement_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn EntitlementStore) {}
    }
}
