//! SQLite implementation of the ChangeRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChangeOrigin, ParameterChange, ParameterId};
use crate::domain::ports::ChangeRepository;

#[derive(Clone)]
pub struct SqliteChangeRepository {
    pool: SqlitePool,
}

impl SqliteChangeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangeRepository for SqliteChangeRepository {
    async fn create(&self, change: &ParameterChange) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO parameter_changes
               (id, parameter, old_value, new_value, reason, origin, changed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(change.id.to_string())
        .bind(change.parameter.as_str())
        .bind(change.old_value)
        .bind(change.new_value)
        .bind(&change.reason)
        .bind(change.origin.as_str())
        .bind(change.changed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ParameterChange>> {
        let row: Option<ChangeRow> =
            sqlx::query_as("SELECT * FROM parameter_changes WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn latest_for_parameter(
        &self,
        parameter: ParameterId,
    ) -> DomainResult<Option<ParameterChange>> {
        let row: Option<ChangeRow> = sqlx::query_as(
            "SELECT * FROM parameter_changes WHERE parameter = ?
             ORDER BY changed_at DESC LIMIT 1",
        )
        .bind(parameter.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<ParameterChange>> {
        let rows: Vec<ChangeRow> = sqlx::query_as(
            "SELECT * FROM parameter_changes WHERE changed_at >= ? ORDER BY changed_at",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_unevaluated(&self) -> DomainResult<Vec<ParameterChange>> {
        let rows: Vec<ChangeRow> = sqlx::query_as(
            r#"SELECT c.* FROM parameter_changes c
               LEFT JOIN ab_test_results r ON r.change_id = c.id
               LEFT JOIN inconclusive_evaluations i ON i.change_id = c.id
               WHERE r.id IS NULL AND i.change_id IS NULL
               ORDER BY c.changed_at"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ChangeRow {
    id: String,
    parameter: String,
    old_value: f64,
    new_value: f64,
    reason: String,
    origin: String,
    changed_at: String,
}

impl TryFrom<ChangeRow> for ParameterChange {
    type Error = DomainError;

    fn try_from(row: ChangeRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| DomainError::Serialization(e.to_string()))?;
        let parameter = ParameterId::from_str(&row.parameter)
            .ok_or_else(|| DomainError::ParameterUnknown(row.parameter.clone()))?;
        let origin = ChangeOrigin::from_str(&row.origin).ok_or_else(|| {
            DomainError::Serialization(format!("Invalid origin: {}", row.origin))
        })?;
        let changed_at = DateTime::parse_from_rfc3339(&row.changed_at)
            .map_err(|e| DomainError::Serialization(e.to_string()))?
            .with_timezone(&Utc);

        Ok(ParameterChange {
            id,
            parameter,
            old_value: row.old_value,
            new_value: row.new_value,
            changed_at,
            reason: row.reason,
            origin,
        })
    }
}
