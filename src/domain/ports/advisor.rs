//! Advisor port - interface for reasoning collaborators.
//!
//! An advisor proposes tuning experiments from a context bundle. Providers
//! are interchangeable strategies behind this trait; their output is
//! validated strictly before any use, so a misbehaving provider degrades
//! into a fallback, never a crash.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AbTestResult, DecisionLogEntry, DeviceState, MetricSnapshot, ParameterChange, ParameterSet,
};

/// Context bundle handed to an advisor.
#[derive(Debug, Clone)]
pub struct AdvisorContext<'a> {
    /// Recent window-aggregated metrics.
    pub metrics: &'a MetricSnapshot,
    /// Fresh device state.
    pub state: &'a DeviceState,
    /// Known parameter definitions and their bounds.
    pub parameters: &'a ParameterSet,
    /// Recent decisions, applied or not.
    pub history: &'a [DecisionLogEntry],
    /// Recently evaluated experiments with their outcomes.
    pub evaluated: &'a [(ParameterChange, AbTestResult)],
}

/// Action kinds an advisor may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalAction {
    Adjust,
    Hold,
}

/// Structured proposal returned by an advisor.
///
/// The shape every provider must produce, whether it is a deterministic
/// rule set or a language model parsing telemetry. `validate` is the single
/// schema gate both paths pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorProposal {
    pub action: ProposalAction,
    /// Target parameter name; required for `Adjust`.
    pub parameter: Option<String>,
    pub current_value: Option<f64>,
    pub suggested_value: Option<f64>,
    pub reasoning: String,
    /// Proposer's confidence, [0, 1].
    pub confidence: f64,
    /// Estimated efficiency gain, normalized to [0, 1].
    #[serde(default)]
    pub expected_impact: f64,
}

impl AdvisorProposal {
    /// Strict schema check. Violations are provider failures that trigger
    /// fallback, never values that flow onward.
    pub fn validate(&self, parameters: &ParameterSet) -> DomainResult<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(DomainError::SchemaViolation(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        if !self.expected_impact.is_finite() || !(0.0..=1.0).contains(&self.expected_impact) {
            return Err(DomainError::SchemaViolation(format!(
                "expected_impact {} outside [0, 1]",
                self.expected_impact
            )));
        }
        if self.reasoning.trim().is_empty() {
            return Err(DomainError::SchemaViolation(
                "reasoning must not be empty".to_string(),
            ));
        }
        match self.action {
            ProposalAction::Hold => Ok(()),
            ProposalAction::Adjust => {
                let name = self.parameter.as_deref().ok_or_else(|| {
                    DomainError::SchemaViolation("adjust proposal missing parameter".to_string())
                })?;
                let id = crate::domain::models::ParameterId::from_str(name).ok_or_else(|| {
                    DomainError::SchemaViolation(format!("unknown parameter '{name}'"))
                })?;
                if parameters.get(id).is_none() {
                    return Err(DomainError::SchemaViolation(format!(
                        "parameter '{name}' has no definition"
                    )));
                }
                let current = self.current_value.ok_or_else(|| {
                    DomainError::SchemaViolation("adjust proposal missing current_value".to_string())
                })?;
                let suggested = self.suggested_value.ok_or_else(|| {
                    DomainError::SchemaViolation(
                        "adjust proposal missing suggested_value".to_string(),
                    )
                })?;
                if !current.is_finite() || !suggested.is_finite() {
                    return Err(DomainError::SchemaViolation(
                        "proposal values must be finite".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Trait for reasoning collaborator implementations.
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Provider name for logs and the fallback chain.
    fn name(&self) -> &'static str;

    /// Produce one structured proposal for the given context.
    async fn propose(&self, context: &AdvisorContext<'_>) -> DomainResult<AdvisorProposal>;
}
