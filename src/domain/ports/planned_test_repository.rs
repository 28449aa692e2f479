//! Planned test repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ParameterId, PlannedTest, TestStatus};

/// Persistence for the experiment backlog.
#[async_trait]
pub trait PlannedTestRepository: Send + Sync {
    async fn create(&self, test: &PlannedTest) -> DomainResult<()>;

    async fn update(&self, test: &PlannedTest) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<PlannedTest>>;

    async fn list_by_status(&self, status: TestStatus) -> DomainResult<Vec<PlannedTest>>;

    /// The non-terminal promoted test for a parameter, if one exists.
    /// At most one test per parameter may be in flight.
    async fn in_flight_for_parameter(
        &self,
        parameter: ParameterId,
    ) -> DomainResult<Option<PlannedTest>>;

    /// The test linked to a given parameter change, if any.
    async fn get_by_change(&self, change_id: Uuid) -> DomainResult<Option<PlannedTest>>;

    /// Proposed and pending tests ordered by execution order.
    async fn list_backlog(&self) -> DomainResult<Vec<PlannedTest>>;
}
