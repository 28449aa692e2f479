//! Proposed decisions and the append-only audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::change::ChangeOrigin;
use super::parameter::ParameterId;

/// A single proposed action for the current cycle.
///
/// `Hold` is an explicit decision, not the absence of one; a scheduler that
/// cannot trust its inputs degrades to `Hold` and says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Adjust {
        parameter: ParameterId,
        current_value: f64,
        suggested_value: f64,
        /// Proposer's confidence, [0, 1].
        confidence: f64,
        reasoning: String,
    },
    Hold {
        reasoning: String,
    },
}

impl Decision {
    pub fn action_str(&self) -> &'static str {
        match self {
            Self::Adjust { .. } => "adjust",
            Self::Hold { .. } => "hold",
        }
    }

    pub fn reasoning(&self) -> &str {
        match self {
            Self::Adjust { reasoning, .. } | Self::Hold { reasoning } => reasoning,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Adjust { confidence, .. } => *confidence,
            // A hold carries no uncertainty worth gating on.
            Self::Hold { .. } => 1.0,
        }
    }

    pub fn parameter(&self) -> Option<ParameterId> {
        match self {
            Self::Adjust { parameter, .. } => Some(*parameter),
            Self::Hold { .. } => None,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Self::Hold { .. })
    }
}

/// One entry in the append-only decision log.
///
/// Every decision is recorded, applied or not; rejections are data for the
/// prioritizer, not silent drops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub id: Uuid,
    pub action: String,
    pub parameter: Option<ParameterId>,
    pub current_value: Option<f64>,
    pub suggested_value: Option<f64>,
    pub confidence: f64,
    pub reasoning: String,
    pub origin: ChangeOrigin,
    pub applied: bool,
    /// Why the safety validator refused, when it did.
    pub rejection_reason: Option<String>,
    /// The resulting change, when the decision was applied.
    pub change_id: Option<Uuid>,
    pub decided_at: DateTime<Utc>,
}

impl DecisionLogEntry {
    /// Record a decision that was applied, linking the resulting change.
    pub fn applied(decision: &Decision, origin: ChangeOrigin, change_id: Uuid) -> Self {
        Self::build(decision, origin, true, None, Some(change_id))
    }

    /// Record a decision the validator rejected.
    pub fn rejected(decision: &Decision, origin: ChangeOrigin, reason: impl Into<String>) -> Self {
        Self::build(decision, origin, false, Some(reason.into()), None)
    }

    /// Record a decision that was not applied for a non-rejection reason
    /// (hold decisions, device write failures).
    pub fn not_applied(decision: &Decision, origin: ChangeOrigin) -> Self {
        Self::build(decision, origin, false, None, None)
    }

    fn build(
        decision: &Decision,
        origin: ChangeOrigin,
        applied: bool,
        rejection_reason: Option<String>,
        change_id: Option<Uuid>,
    ) -> Self {
        let (current_value, suggested_value) = match decision {
            Decision::Adjust {
                current_value,
                suggested_value,
                ..
            } => (Some(*current_value), Some(*suggested_value)),
            Decision::Hold { .. } => (None, None),
        };
        Self {
            id: Uuid::new_v4(),
            action: decision.action_str().to_string(),
            parameter: decision.parameter(),
            current_value,
            suggested_value,
            confidence: decision.confidence(),
            reasoning: decision.reasoning().to_string(),
            origin,
            applied,
            rejection_reason,
            change_id,
            decided_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjust() -> Decision {
        Decision::Adjust {
            parameter: ParameterId::CurveOffset,
            current_value: 0.0,
            suggested_value: 1.0,
            confidence: 0.8,
            reasoning: "cheap power and falling outdoor temperature ahead".to_string(),
        }
    }

    #[test]
    fn test_rejected_entry_keeps_reason() {
        let entry = DecisionLogEntry::rejected(&adjust(), ChangeOrigin::Rule, "step too large");
        assert!(!entry.applied);
        assert_eq!(entry.rejection_reason.as_deref(), Some("step too large"));
        assert_eq!(entry.parameter, Some(ParameterId::CurveOffset));
        assert!(entry.change_id.is_none());
    }

    #[test]
    fn test_applied_entry_links_change() {
        let change_id = Uuid::new_v4();
        let entry = DecisionLogEntry::applied(&adjust(), ChangeOrigin::Rule, change_id);
        assert!(entry.applied);
        assert_eq!(entry.change_id, Some(change_id));
        assert!(entry.rejection_reason.is_none());
    }

    #[test]
    fn test_hold_has_no_parameter() {
        let hold = Decision::Hold {
            reasoning: "price forecast unavailable".to_string(),
        };
        let entry = DecisionLogEntry::not_applied(&hold, ChangeOrigin::Rule);
        assert_eq!(entry.action, "hold");
        assert!(entry.parameter.is_none());
        assert!(entry.current_value.is_none());
    }
}
