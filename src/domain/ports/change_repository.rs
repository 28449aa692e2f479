//! Parameter change repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ParameterChange, ParameterId};

/// Persistence for applied parameter changes. Changes are immutable; there
/// is deliberately no update or delete.
#[async_trait]
pub trait ChangeRepository: Send + Sync {
    async fn create(&self, change: &ParameterChange) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<ParameterChange>>;

    /// Most recent change for a parameter, if any. Drives the per-parameter
    /// cooldown rule.
    async fn latest_for_parameter(&self, parameter: ParameterId)
        -> DomainResult<Option<ParameterChange>>;

    /// Changes applied at or after `since`, oldest first.
    async fn list_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<ParameterChange>>;

    /// Changes with neither a test result nor an inconclusive marker,
    /// oldest first.
    async fn list_unevaluated(&self) -> DomainResult<Vec<ParameterChange>>;
}
