//! A/B test result repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::AbTestResult;

/// Persistence for evaluation results. A result is written exactly once per
/// change; re-creating for the same change is an error, keeping evaluation
/// idempotent at the storage boundary too.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn create(&self, result: &AbTestResult) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<AbTestResult>>;

    async fn get_by_change(&self, change_id: Uuid) -> DomainResult<Option<AbTestResult>>;

    /// Results evaluated at or after `since`, oldest first.
    async fn list_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<AbTestResult>>;

    /// Record that a change's evaluation came up inconclusive. Distinct
    /// from a scored result; keeps the change from being re-evaluated
    /// every cycle.
    async fn mark_inconclusive(&self, change_id: Uuid, reason: &str) -> DomainResult<()>;
}
