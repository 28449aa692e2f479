//! Before/after experiment results.
//!
//! An `AbTestResult` is owned by exactly one `ParameterChange` and written
//! once, after the post-change dwell window has fully elapsed. Evaluating
//! the same snapshots again must reproduce the identical result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metrics::MetricSnapshot;

/// Categorical recommendation derived from the total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Score >= 70: keep the change, strong signal.
    KeepStrong,
    /// Score 55-69: keep the change, moderate signal.
    KeepModerate,
    /// Score 45-54: no clear signal either way.
    Neutral,
    /// Score 30-44, or any result with a comfort drift of 1.0 C or more.
    Adjust,
    /// Score < 30: revert the change.
    Revert,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepStrong => "keep_strong",
            Self::KeepModerate => "keep_moderate",
            Self::Neutral => "neutral",
            Self::Adjust => "adjust",
            Self::Revert => "revert",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "keep_strong" => Some(Self::KeepStrong),
            "keep_moderate" => Some(Self::KeepModerate),
            "neutral" => Some(Self::Neutral),
            "adjust" => Some(Self::Adjust),
            "revert" => Some(Self::Revert),
            _ => None,
        }
    }

    /// Map a total score to its band, before any comfort override.
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            Self::KeepStrong
        } else if score >= 55.0 {
            Self::KeepModerate
        } else if score >= 45.0 {
            Self::Neutral
        } else if score >= 30.0 {
            Self::Adjust
        } else {
            Self::Revert
        }
    }

    /// Whether this recommendation endorses keeping the change.
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::KeepStrong | Self::KeepModerate)
    }
}

/// The five weighted component scores, in points relative to the neutral
/// baseline of 50.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentScores {
    pub efficiency: f64,
    pub delta_t: f64,
    pub comfort: f64,
    pub cycling: f64,
    pub cost: f64,
}

impl ComponentScores {
    pub fn sum(&self) -> f64 {
        self.efficiency + self.delta_t + self.comfort + self.cycling + self.cost
    }
}

/// Scored outcome of one applied change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTestResult {
    pub id: Uuid,
    /// The change this result evaluates. 1:1, owner side of the link.
    pub change_id: Uuid,
    pub before: MetricSnapshot,
    pub after: MetricSnapshot,
    /// Outdoor conditions diverged beyond the configured threshold between
    /// the two windows; the score stands but carries a caveat.
    pub weather_divergent: bool,
    pub scores: ComponentScores,
    /// Total score, clamped to [0, 100].
    pub total_score: f64,
    pub recommendation: Recommendation,
    /// Human-readable summary, including the weather caveat when set.
    pub summary: String,
    pub evaluated_at: DateTime<Utc>,
}

impl AbTestResult {
    /// Absolute indoor temperature drift between the windows.
    pub fn comfort_drift(&self) -> f64 {
        (self.after.indoor_temp - self.before.indoor_temp).abs()
    }
}

/// Outcome of an evaluation attempt. Insufficient data is a first-class
/// outcome, never coerced into a numeric score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Completed(AbTestResult),
    Inconclusive {
        change_id: Uuid,
        reason: String,
    },
}

impl EvaluationOutcome {
    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn result(&self) -> Option<&AbTestResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Inconclusive { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bands() {
        assert_eq!(Recommendation::from_score(85.0), Recommendation::KeepStrong);
        assert_eq!(Recommendation::from_score(70.0), Recommendation::KeepStrong);
        assert_eq!(Recommendation::from_score(58.0), Recommendation::KeepModerate);
        assert_eq!(Recommendation::from_score(50.0), Recommendation::Neutral);
        assert_eq!(Recommendation::from_score(44.9), Recommendation::Adjust);
        assert_eq!(Recommendation::from_score(29.9), Recommendation::Revert);
    }

    #[test]
    fn test_recommendation_round_trip() {
        for rec in [
            Recommendation::KeepStrong,
            Recommendation::KeepModerate,
            Recommendation::Neutral,
            Recommendation::Adjust,
            Recommendation::Revert,
        ] {
            assert_eq!(Recommendation::from_str(rec.as_str()), Some(rec));
        }
    }

    #[test]
    fn test_component_sum() {
        let scores = ComponentScores {
            efficiency: 8.0,
            delta_t: 1.0,
            comfort: -2.0,
            cycling: 2.0,
            cost: 0.5,
        };
        assert!((scores.sum() - 9.5).abs() < 1e-9);
    }
}
