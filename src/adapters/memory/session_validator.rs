//! In-memory implementation of the session validator.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::SessionValidator;

/// Session validator backed by a token map. Tokens are seeded by tests.
pub struct InMemorySessionValidator {
    sessions: Mutex<HashMap<String, UserId>>,
}

impl InMemorySessionValidator {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a bearer token for a user.
    pub fn seed(&self, token: &str, user_id: UserId) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(token.to_string(), user_id);
    }

    /// Removes a token, simulating logout or expiry.
    pub fn revoke(&self, token: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(token);
    }
}

impl Default for InMemorySessionValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionValidator for InMemorySessionValidator {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, DomainError> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sessions.get(token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[tokio::test]
    async fn resolves_seeded_token() {
        let validator = InMemorySessionValidator::new();
        validator.seed("tok-abc", user());

        let resolved = validator.resolve("tok-abc").await.unwrap();
        assert_eq!(resolved, Some(user()));
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_none() {
        let validator = InMemorySessionValidator::new();
        assert_eq!(validator.resolve("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn revoked_token_resolves_to_none() {
        let validator = InMemorySessionValidator::new();
        validator.seed("tok-abc", user());
        validator.revoke("tok-abc");

        assert_eq!(validator.resolve("tok-abc").await.unwrap(), None);
    }
}
