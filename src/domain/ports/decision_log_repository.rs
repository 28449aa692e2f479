//! Decision log repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::DecisionLogEntry;

/// Append-only persistence for the decision audit trail. There is no
/// update or delete by design; the log is the feedback channel for "what
/// have we tried and did it work".
#[async_trait]
pub trait DecisionLogRepository: Send + Sync {
    async fn append(&self, entry: &DecisionLogEntry) -> DomainResult<()>;

    /// Most recent entries, newest first.
    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<DecisionLogEntry>>;

    /// Entries decided at or after `since`, oldest first.
    async fn list_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<DecisionLogEntry>>;
}
