//! PostgreSQL implementation of the entitlement store.
//!
//! The conditional counter writes are single UPDATE statements whose WHERE
//! clause carries the observed value; `rows_affected` tells the caller
//! whether its observation still held. A partial unique index on
//! `(user_id) WHERE status = 'active'` enforces the one-active-row rule.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{Entitlement, EntitlementStatus};
use crate::domain::foundation::{
    DomainError, EntitlementId, ErrorCode, PlanId, Timestamp, UserId,
};
use crate::ports::EntitlementStore;

/// Entitlement store backed by the `entitlements` table.
pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntitlementRow {
    id: Uuid,
    user_id: String,
    plan_id: String,
    status: String,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    cancel_at_period_end: bool,
    usage_count: i64,
    usage_reset_at: DateTime<Utc>,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EntitlementRow> for Entitlement {
    type Error = DomainError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        let status = EntitlementStatus::parse(&row.status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid status value: {}", row.status),
            )
        })?;
        let user_id = UserId::new(&row.user_id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid user id: {}", e))
        })?;
        let plan_id = PlanId::new(&row.plan_id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid plan id: {}", e))
        })?;
        let usage_count = u32::try_from(row.usage_count).map_err(|_| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid usage count: {}", row.usage_count),
            )
        })?;

        Ok(Entitlement {
            id: EntitlementId::from_uuid(row.id),
            user_id,
            plan_id,
            status,
            current_period_start: Timestamp::from_datetime(row.current_period_start),
            current_period_end: Timestamp::from_datetime(row.current_period_end),
            cancel_at_period_end: row.cancel_at_period_end,
            usage_count,
            usage_reset_at: Timestamp::from_datetime(row.usage_reset_at),
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

const ENTITLEMENT_COLUMNS: &str = "id, user_id, plan_id, status, current_period_start, \
     current_period_end, cancel_at_period_end, usage_count, usage_reset_at, \
     stripe_customer_id, stripe_subscription_id, created_at, updated_at";

fn db_error(e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, e.to_string())
}

#[async_trait]
impl EntitlementStore for PostgresEntitlementStore {
    async fn find_active_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Entitlement>, DomainError> {
        let row: Option<EntitlementRow> = sqlx::query_as(&format!(
            "SELECT {ENTITLEMENT_COLUMNS} FROM entitlements WHERE user_id = $1 AND status = 'active'"
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Entitlement::try_from).transpose()
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Entitlement>, DomainError> {
        // Prefer the active row when several historical rows exist.
        let row: Option<EntitlementRow> = sqlx::query_as(&format!(
            "SELECT {ENTITLEMENT_COLUMNS} FROM entitlements WHERE user_id = $1 \
             ORDER BY (status = 'active') DESC, updated_at DESC LIMIT 1"
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Entitlement::try_from).transpose()
    }

    async fn find_by_stripe_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Entitlement>, DomainError> {
        let row: Option<EntitlementRow> = sqlx::query_as(&format!(
            "SELECT {ENTITLEMENT_COLUMNS} FROM entitlements WHERE stripe_subscription_id = $1"
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Entitlement::try_from).transpose()
    }

    async fn insert(&self, entitlement: &Entitlement) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO entitlements (
                id, user_id, plan_id, status, current_period_start, current_period_end,
                cancel_at_period_end, usage_count, usage_reset_at,
                stripe_customer_id, stripe_subscription_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(entitlement.id.as_uuid())
        .bind(entitlement.user_id.as_str())
        .bind(entitlement.plan_id.as_str())
        .bind(entitlement.status.as_str())
        .bind(entitlement.current_period_start.as_datetime())
        .bind(entitlement.current_period_end.as_datetime())
        .bind(entitlement.cancel_at_period_end)
        .bind(i64::from(entitlement.usage_count))
        .bind(entitlement.usage_reset_at.as_datetime())
        .bind(entitlement.stripe_customer_id.as_deref())
        .bind(entitlement.stripe_subscription_id.as_deref())
        .bind(entitlement.created_at.as_datetime())
        .bind(entitlement.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn update(&self, entitlement: &Entitlement) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE entitlements SET
                plan_id = $2,
                status = $3,
                current_period_start = $4,
                current_period_end = $5,
                cancel_at_period_end = $6,
                usage_count = $7,
                usage_reset_at = $8,
                stripe_customer_id = $9,
                stripe_subscription_id = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(entitlement.id.as_uuid())
        .bind(entitlement.plan_id.as_str())
        .bind(entitlement.status.as_str())
        .bind(entitlement.current_period_start.as_datetime())
        .bind(entitlement.current_period_end.as_datetime())
        .bind(entitlement.cancel_at_period_end)
        .bind(i64::from(entitlement.usage_count))
        .bind(entitlement.usage_reset_at.as_datetime())
        .bind(entitlement.stripe_customer_id.as_deref())
        .bind(entitlement.stripe_subscription_id.as_deref())
        .bind(entitlement.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::EntitlementNotFound,
                "Entitlement not found",
            ));
        }
        Ok(())
    }

    async fn try_consume(
        &self,
        id: &EntitlementId,
        observed_usage: u32,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE entitlements
            SET usage_count = usage_count + 1, updated_at = NOW()
            WHERE id = $1 AND status = 'active' AND usage_count = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(i64::from(observed_usage))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_reset_usage(
        &self,
        id: &EntitlementId,
        new_reset_at: Timestamp,
        observed_reset_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE entitlements
            SET usage_count = 0, usage_reset_at = $2, updated_at = NOW()
            WHERE id = $1 AND usage_reset_at = $3
            "#,
        )
        .bind(id.as_uuid())
        .bind(new_reset_at.as_datetime())
        .bind(observed_reset_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }
}
