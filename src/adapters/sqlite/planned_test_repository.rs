//! SQLite implementation of the PlannedTestRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ChangeOrigin, ParameterId, PlannedTest, TestStatus};
use crate::domain::ports::PlannedTestRepository;

#[derive(Clone)]
pub struct SqlitePlannedTestRepository {
    pool: SqlitePool,
}

impl SqlitePlannedTestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlannedTestRepository for SqlitePlannedTestRepository {
    async fn create(&self, test: &PlannedTest) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO planned_tests
               (id, parameter, current_value, proposed_value, hypothesis,
                expected_improvement, confidence, priority_score, execution_order,
                origin, status, change_id, result_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(test.id.to_string())
        .bind(test.parameter.as_str())
        .bind(test.current_value)
        .bind(test.proposed_value)
        .bind(&test.hypothesis)
        .bind(test.expected_improvement)
        .bind(test.confidence)
        .bind(test.priority_score)
        .bind(i64::from(test.execution_order))
        .bind(test.origin.as_str())
        .bind(test.status.as_str())
        .bind(test.change_id.map(|id| id.to_string()))
        .bind(test.result_id.map(|id| id.to_string()))
        .bind(test.created_at.to_rfc3339())
        .bind(test.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, test: &PlannedTest) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE planned_tests SET
               current_value = ?, proposed_value = ?, hypothesis = ?,
               expected_improvement = ?, confidence = ?, priority_score = ?,
               execution_order = ?, origin = ?, status = ?, change_id = ?,
               result_id = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(test.current_value)
        .bind(test.proposed_value)
        .bind(&test.hypothesis)
        .bind(test.expected_improvement)
        .bind(test.confidence)
        .bind(test.priority_score)
        .bind(i64::from(test.execution_order))
        .bind(test.origin.as_str())
        .bind(test.status.as_str())
        .bind(test.change_id.map(|id| id.to_string()))
        .bind(test.result_id.map(|id| id.to_string()))
        .bind(test.updated_at.to_rfc3339())
        .bind(test.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TestNotFound(test.id));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<PlannedTest>> {
        let row: Option<PlannedTestRow> =
            sqlx::query_as("SELECT * FROM planned_tests WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_by_status(&self, status: TestStatus) -> DomainResult<Vec<PlannedTest>> {
        let rows: Vec<PlannedTestRow> = sqlx::query_as(
            "SELECT * FROM planned_tests WHERE status = ?
             ORDER BY execution_order, created_at",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn in_flight_for_parameter(
        &self,
        parameter: ParameterId,
    ) -> DomainResult<Option<PlannedTest>> {
        let row: Option<PlannedTestRow> = sqlx::query_as(
            r#"SELECT * FROM planned_tests
               WHERE parameter = ? AND status IN ('pending', 'active')
               ORDER BY updated_at DESC LIMIT 1"#,
        )
        .bind(parameter.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_change(&self, change_id: Uuid) -> DomainResult<Option<PlannedTest>> {
        let row: Option<PlannedTestRow> =
            sqlx::query_as("SELECT * FROM planned_tests WHERE change_id = ?")
                .bind(change_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_backlog(&self) -> DomainResult<Vec<PlannedTest>> {
        let rows: Vec<PlannedTestRow> = sqlx::query_as(
            r#"SELECT * FROM planned_tests
               WHERE status IN ('proposed', 'pending')
               ORDER BY execution_order, created_at"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct PlannedTestRow {
    id: String,
    parameter: String,
    current_value: f64,
    proposed_value: f64,
    hypothesis: String,
    expected_improvement: f64,
    confidence: f64,
    priority_score: f64,
    execution_order: i64,
    origin: String,
    status: String,
    change_id: Option<String>,
    result_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PlannedTestRow> for PlannedTest {
    type Error = DomainError;

    fn try_from(row: PlannedTestRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| DomainError::Serialization(e.to_string()))?;
        let parameter = ParameterId::from_str(&row.parameter)
            .ok_or_else(|| DomainError::ParameterUnknown(row.parameter.clone()))?;
        let origin = ChangeOrigin::from_str(&row.origin).ok_or_else(|| {
            DomainError::Serialization(format!("Invalid origin: {}", row.origin))
        })?;
        let status = TestStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::Serialization(format!("Invalid status: {}", row.status))
        })?;
        let change_id = row
            .change_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| DomainError::Serialization(e.to_string()))?;
        let result_id = row
            .result_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| DomainError::Serialization(e.to_string()))?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| DomainError::Serialization(e.to_string()))?
            .with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&row.updated_at)
            .map_err(|e| DomainError::Serialization(e.to_string()))?
            .with_timezone(&Utc);

        Ok(PlannedTest {
            id,
            parameter,
            current_value: row.current_value,
            proposed_value: row.proposed_value,
            hypothesis: row.hypothesis,
            expected_improvement: row.expected_improvement,
            confidence: row.confidence,
            priority_score: row.priority_score,
            execution_order: row.execution_order as u32,
            origin,
            status,
            change_id,
            result_id,
            created_at,
            updated_at,
        })
    }
}
