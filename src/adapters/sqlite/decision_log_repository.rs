//! SQLite implementation of the DecisionLogRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChangeOrigin, DecisionLogEntry, ParameterId};
use crate::domain::ports::DecisionLogRepository;

#[derive(Clone)]
pub struct SqliteDecisionLogRepository {
    pool: SqlitePool,
}

impl SqliteDecisionLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DecisionLogRepository for SqliteDecisionLogRepository {
    async fn append(&self, entry: &DecisionLogEntry) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO decision_log
               (id, action, parameter, current_value, suggested_value, confidence,
                reasoning, origin, applied, rejection_reason, change_id, decided_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.action)
        .bind(entry.parameter.map(|p| p.as_str()))
        .bind(entry.current_value)
        .bind(entry.suggested_value)
        .bind(entry.confidence)
        .bind(&entry.reasoning)
        .bind(entry.origin.as_str())
        .bind(i32::from(entry.applied))
        .bind(&entry.rejection_reason)
        .bind(entry.change_id.map(|id| id.to_string()))
        .bind(entry.decided_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<DecisionLogEntry>> {
        let rows: Vec<DecisionRow> =
            sqlx::query_as("SELECT * FROM decision_log ORDER BY decided_at DESC LIMIT ?")
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<DecisionLogEntry>> {
        let rows: Vec<DecisionRow> =
            sqlx::query_as("SELECT * FROM decision_log WHERE decided_at >= ? ORDER BY decided_at")
                .bind(since.to_rfc3339())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct DecisionRow {
    id: String,
    action: String,
    parameter: Option<String>,
    current_value: Option<f64>,
    suggested_value: Option<f64>,
    confidence: f64,
    reasoning: String,
    origin: String,
    applied: i32,
    rejection_reason: Option<String>,
    change_id: Option<String>,
    decided_at: String,
}

impl TryFrom<DecisionRow> for DecisionLogEntry {
    type Error = DomainError;

    fn try_from(row: DecisionRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| DomainError::Serialization(e.to_string()))?;
        let parameter = row
            .parameter
            .as_deref()
            .map(|s| {
                ParameterId::from_str(s).ok_or_else(|| DomainError::ParameterUnknown(s.to_string()))
            })
            .transpose()?;
        let origin = ChangeOrigin::from_str(&row.origin).ok_or_else(|| {
            DomainError::Serialization(format!("Invalid origin: {}", row.origin))
        })?;
        let change_id = row
            .change_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| DomainError::Serialization(e.to_string()))?;
        let decided_at = DateTime::parse_from_rfc3339(&row.decided_at)
            .map_err(|e| DomainError::Serialization(e.to_string()))?
            .with_timezone(&Utc);

        Ok(DecisionLogEntry {
            id,
            action: row.action,
            parameter,
            current_value: row.current_value,
            suggested_value: row.suggested_value,
            confidence: row.confidence,
            reasoning: row.reasoning,
            origin,
            applied: row.applied != 0,
            rejection_reason: row.rejection_reason,
            change_id,
            decided_at,
        })
    }
}
