//! Applied parameter adjustments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parameter::ParameterId;

/// Where a change (or decision) originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// Operator-initiated.
    Manual,
    /// Deterministic rule set or the predictive scheduler.
    Rule,
    /// External reasoning collaborator.
    Advisor,
}

impl ChangeOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Rule => "rule",
            Self::Advisor => "advisor",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "rule" => Some(Self::Rule),
            "advisor" | "reasoning-service" => Some(Self::Advisor),
            _ => None,
        }
    }
}

/// One applied adjustment to a device parameter.
///
/// Created only after the device write confirmed success; immutable
/// afterward. Referenced by at most one A/B test result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub id: Uuid,
    pub parameter: ParameterId,
    pub old_value: f64,
    pub new_value: f64,
    pub changed_at: DateTime<Utc>,
    /// Free-text rationale recorded at application time.
    pub reason: String,
    pub origin: ChangeOrigin,
}

impl ParameterChange {
    pub fn new(
        parameter: ParameterId,
        old_value: f64,
        new_value: f64,
        reason: impl Into<String>,
        origin: ChangeOrigin,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parameter,
            old_value,
            new_value,
            changed_at: Utc::now(),
            reason: reason.into(),
            origin,
        }
    }

    /// Signed magnitude of the adjustment.
    pub fn delta(&self) -> f64 {
        self.new_value - self.old_value
    }

    /// Direction of the adjustment: +1, -1, or 0.
    pub fn direction(&self) -> i8 {
        match self.delta().partial_cmp(&0.0) {
            Some(std::cmp::Ordering::Greater) => 1,
            Some(std::cmp::Ordering::Less) => -1,
            _ => 0,
        }
    }
}
