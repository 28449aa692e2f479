//! SQLite implementation of the ResultRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AbTestResult, ComponentScores, MetricSnapshot, Recommendation,
};
use crate::domain::ports::ResultRepository;

#[derive(Clone)]
pub struct SqliteResultRepository {
    pool: SqlitePool,
}

impl SqliteResultRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultRepository for SqliteResultRepository {
    async fn create(&self, result: &AbTestResult) -> DomainResult<()> {
        let before_json = serde_json::to_string(&result.before)?;
        let after_json = serde_json::to_string(&result.after)?;

        let outcome = sqlx::query(
            r#"INSERT INTO ab_test_results
               (id, change_id, before_snapshot, after_snapshot, weather_divergent,
                efficiency_score, delta_t_score, comfort_score, cycling_score, cost_score,
                total_score, recommendation, summary, evaluated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(result.id.to_string())
        .bind(result.change_id.to_string())
        .bind(&before_json)
        .bind(&after_json)
        .bind(i32::from(result.weather_divergent))
        .bind(result.scores.efficiency)
        .bind(result.scores.delta_t)
        .bind(result.scores.comfort)
        .bind(result.scores.cycling)
        .bind(result.scores.cost)
        .bind(result.total_score)
        .bind(result.recommendation.as_str())
        .bind(&result.summary)
        .bind(result.evaluated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match outcome {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(DomainError::ResultAlreadyRecorded(result.change_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<AbTestResult>> {
        let row: Option<ResultRow> = sqlx::query_as("SELECT * FROM ab_test_results WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_change(&self, change_id: Uuid) -> DomainResult<Option<AbTestResult>> {
        let row: Option<ResultRow> =
            sqlx::query_as("SELECT * FROM ab_test_results WHERE change_id = ?")
                .bind(change_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<AbTestResult>> {
        let rows: Vec<ResultRow> = sqlx::query_as(
            "SELECT * FROM ab_test_results WHERE evaluated_at >= ? ORDER BY evaluated_at",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn mark_inconclusive(&self, change_id: Uuid, reason: &str) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT OR IGNORE INTO inconclusive_evaluations (change_id, reason, evaluated_at)
               VALUES (?, ?, ?)"#,
        )
        .bind(change_id.to_string())
        .bind(reason)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ResultRow {
    id: String,
    change_id: String,
    before_snapshot: String,
    after_snapshot: String,
    weather_divergent: i32,
    efficiency_score: f64,
    delta_t_score: f64,
    comfort_score: f64,
    cycling_score: f64,
    cost_score: f64,
    total_score: f64,
    recommendation: String,
    summary: String,
    evaluated_at: String,
}

impl TryFrom<ResultRow> for AbTestResult {
    type Error = DomainError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| DomainError::Serialization(e.to_string()))?;
        let change_id = Uuid::parse_str(&row.change_id)
            .map_err(|e| DomainError::Serialization(e.to_string()))?;
        let before: MetricSnapshot = serde_json::from_str(&row.before_snapshot)?;
        let after: MetricSnapshot = serde_json::from_str(&row.after_snapshot)?;
        let recommendation = Recommendation::from_str(&row.recommendation).ok_or_else(|| {
            DomainError::Serialization(format!("Invalid recommendation: {}", row.recommendation))
        })?;
        let evaluated_at = DateTime::parse_from_rfc3339(&row.evaluated_at)
            .map_err(|e| DomainError::Serialization(e.to_string()))?
            .with_timezone(&Utc);

        Ok(AbTestResult {
            id,
            change_id,
            before,
            after,
            weather_divergent: row.weather_divergent != 0,
            scores: ComponentScores {
                efficiency: row.efficiency_score,
                delta_t: row.delta_t_score,
                comfort: row.comfort_score,
                cycling: row.cycling_score,
                cost: row.cost_score,
            },
            total_score: row.total_score,
            recommendation,
            summary: row.summary,
            evaluated_at,
        })
    }
}
