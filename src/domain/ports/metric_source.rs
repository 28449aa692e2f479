//! Metric source port - window aggregation of appliance telemetry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::MetricSnapshot;

/// Aggregates raw telemetry into a fixed-shape summary for a time window.
///
/// Implementations must be idempotent and side-effect-free for a given
/// window: the evaluator relies on re-aggregating the same window yielding
/// the same snapshot.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Aggregate metrics over `[window_start, window_end]`.
    async fn aggregate(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> DomainResult<MetricSnapshot>;
}
