//! PostgreSQL implementation of the session validator.
//!
//! Sessions are issued by the account system; this adapter only resolves
//! bearer tokens against the `sessions` table.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::SessionValidator;

/// Session validator backed by the `sessions` table.
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionValidator for PostgresSessionStore {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, DomainError> {
        let user_id: Option<String> = sqlx::query_scalar(
            "SELECT user_id FROM sessions WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?;

        user_id
            .map(|id| {
                UserId::new(&id).map_err(|e| {
                    DomainError::new(ErrorCode::DatabaseError, format!("Invalid user id: {}", e))
                })
            })
            .transpose()
    }
}
