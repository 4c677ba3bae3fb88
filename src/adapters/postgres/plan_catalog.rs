//! PostgreSQL implementation of the plan catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::billing::{CreditAllowance, Plan, PlanInterval};
use crate::domain::foundation::{DomainError, ErrorCode, PlanId, Timestamp};
use crate::ports::PlanCatalog;

/// Read-only plan catalog backed by the `plans` table.
pub struct PostgresPlanCatalog {
    pool: PgPool,
}

impl PostgresPlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: String,
    name: String,
    description: Option<String>,
    price_cents: i64,
    currency: String,
    interval: String,
    credits_per_period: i64,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PlanRow> for Plan {
    type Error = DomainError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let interval = PlanInterval::parse(&row.interval).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid interval value: {}", row.interval),
            )
        })?;
        let allowance = CreditAllowance::from_column(row.credits_per_period).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid credits value: {}", row.credits_per_period),
            )
        })?;
        let id = PlanId::new(&row.id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid plan id: {}", e))
        })?;

        Ok(Plan {
            id,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            currency: row.currency,
            interval,
            allowance,
            active: row.active,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

const PLAN_COLUMNS: &str = "id, name, description, price_cents, currency, interval, \
     credits_per_period, active, created_at, updated_at";

#[async_trait]
impl PlanCatalog for PostgresPlanCatalog {
    async fn list_active(&self) -> Result<Vec<Plan>, DomainError> {
        let rows: Vec<PlanRow> = sqlx::query_as(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE active = TRUE ORDER BY price_cents ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?;

        rows.into_iter().map(Plan::try_from).collect()
    }

    async fn find_by_id(&self, plan_id: &PlanId) -> Result<Option<Plan>, DomainError> {
        let row: Option<PlanRow> =
            sqlx::query_as(&format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1"))
                .bind(plan_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?;

        row.map(Plan::try_from).transpose()
    }
}
