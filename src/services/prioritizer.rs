//! Experiment backlog prioritization.
//!
//! Turns validated advisor proposals into planned tests, scores them, and
//! keeps the backlog ordered. The score prefers high expected gain and
//! confidence, wide safety margins, and small, simple changes; history
//! that already went badly discounts a repeat before it is queued.

use tracing::{debug, info};

use crate::domain::models::{
    AbTestResult, ChangeOrigin, ParameterChange, ParameterDefinition, ParameterSet, PlannedTest,
    PrioritizerConfig,
};
use crate::domain::ports::{AdvisorProposal, ProposalAction};

/// Scores and orders candidate experiments.
pub struct TestPrioritizer {
    config: PrioritizerConfig,
}

impl TestPrioritizer {
    pub fn new(config: PrioritizerConfig) -> Self {
        Self { config }
    }

    /// Convert a validated adjust-proposal into a planned test, applying
    /// the repeat penalty against recent evaluated history.
    ///
    /// Callers must have run the proposal through its schema check first;
    /// hold proposals yield no test.
    pub fn admit(
        &self,
        proposal: &AdvisorProposal,
        origin: ChangeOrigin,
        parameters: &ParameterSet,
        recent_evaluated: &[(ParameterChange, AbTestResult)],
    ) -> Option<PlannedTest> {
        if proposal.action != ProposalAction::Adjust {
            return None;
        }
        // Schema validation guarantees these are present for adjusts.
        let parameter = crate::domain::models::ParameterId::from_str(
            proposal.parameter.as_deref()?,
        )?;
        let current = proposal.current_value?;
        let proposed = proposal.suggested_value?;
        let definition = parameters.get(parameter)?;

        // Soft bounds check at creation time; the validator re-checks at
        // application time and wins if the two disagree.
        if !definition.in_bounds(proposed) {
            debug!(
                %parameter,
                proposed, "discarding candidate outside configured bounds"
            );
            return None;
        }

        let mut test = PlannedTest::new(
            parameter,
            current,
            proposed,
            proposal.reasoning.clone(),
            proposal.expected_impact,
            proposal.confidence,
        )
        .with_origin(origin);

        if self.repeats_poor_change(&test, recent_evaluated) {
            test.confidence *= self.config.repeat_penalty;
            info!(
                %parameter,
                confidence = test.confidence,
                "penalizing candidate that repeats a poorly scored change"
            );
        }

        Some(test)
    }

    /// Priority score for one candidate.
    ///
    /// Weighted sum of expected gain, confidence, safety margin, and an
    /// inverse-complexity bonus; the weights are configuration, not law.
    pub fn priority_score(&self, test: &PlannedTest, definition: &ParameterDefinition) -> f64 {
        let weights = &self.config.weights;
        weights.expected_gain * test.expected_improvement.clamp(0.0, 1.0)
            + weights.confidence * test.confidence.clamp(0.0, 1.0)
            + weights.safety_margin * Self::safety_margin(test, definition)
            + weights.simplicity * Self::simplicity(test, definition)
    }

    /// Normalized headroom: how far the proposed value sits from the
    /// nearest bound and how much of the step budget it leaves unused.
    fn safety_margin(test: &PlannedTest, definition: &ParameterDefinition) -> f64 {
        let span = definition.max - definition.min;
        if span <= 0.0 || definition.max_step <= 0.0 {
            return 0.0;
        }
        let to_bound = (test.proposed_value - definition.min)
            .min(definition.max - test.proposed_value)
            .max(0.0);
        let bound_margin = (to_bound / (span / 2.0)).min(1.0);
        let step_margin = 1.0 - (test.delta().abs() / definition.max_step).min(1.0);
        (bound_margin + step_margin) / 2.0
    }

    /// Smaller relative changes are simpler experiments.
    fn simplicity(test: &PlannedTest, definition: &ParameterDefinition) -> f64 {
        if definition.max_step <= 0.0 {
            return 0.0;
        }
        1.0 - (test.delta().abs() / definition.max_step).clamp(0.0, 1.0)
    }

    /// Score and order a backlog: priority descending, ties broken by the
    /// smaller magnitude of change (prefer the least invasive experiment).
    /// Execution order is the resulting rank, from 1.
    pub fn reprioritize(
        &self,
        mut backlog: Vec<PlannedTest>,
        parameters: &ParameterSet,
    ) -> Vec<PlannedTest> {
        for test in &mut backlog {
            if let Some(definition) = parameters.get(test.parameter) {
                test.priority_score = self.priority_score(test, definition);
            } else {
                test.priority_score = 0.0;
            }
        }

        backlog.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.delta()
                        .abs()
                        .partial_cmp(&b.delta().abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        backlog.truncate(self.config.max_backlog);
        for (rank, test) in backlog.iter_mut().enumerate() {
            test.execution_order = rank as u32 + 1;
        }
        backlog
    }

    /// Whether the candidate repeats a parameter/direction pair that scored
    /// below neutral in the recent evaluated history.
    fn repeats_poor_change(
        &self,
        test: &PlannedTest,
        recent_evaluated: &[(ParameterChange, AbTestResult)],
    ) -> bool {
        recent_evaluated.iter().any(|(change, result)| {
            change.parameter == test.parameter
                && change.direction() == test.direction()
                && result.total_score < 45.0
        })
    }
}
