//! Session validator port - resolves bearer tokens to user identities.
//!
//! Session issuance (login, registration, token generation) is an external
//! collaborator; the core only needs the lookup.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};

/// Resolves a bearer token to the user it belongs to.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Returns the user id for a valid, unexpired token, `None` otherwise.
    ///
    /// Expired and unknown tokens are indistinguishable to the caller by
    /// design; both yield a 401.
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_validator_is_object_safe() {
        fn _accepts_dyn(_validator: &dyn SessionValidator) {}
    }
}
