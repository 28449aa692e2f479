//! Before/after experiment evaluation.
//!
//! Captures a baseline window ending at the change, waits out a settle
//! offset plus the dwell window, then scores the two windows against each
//! other. Scoring is a pure function of the two snapshots; evaluating the
//! same inputs twice yields the identical result.

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AbTestResult, ComponentScores, EvaluationConfig, EvaluationOutcome, MetricSnapshot,
    ParameterChange, Recommendation,
};
use crate::domain::ports::MetricSource;

/// Neutral starting score before any component adjustments.
const BASELINE_SCORE: f64 = 50.0;

/// Points contributed by a component at full weight, per unit of credit.
const POINTS_PER_WEIGHT: f64 = 20.0;

/// Indoor drift below which comfort is considered stable.
const COMFORT_STABLE_C: f64 = 0.5;

/// Indoor drift at or above which the comfort override caps the
/// recommendation at adjust.
const COMFORT_OVERRIDE_C: f64 = 1.0;

/// Evaluates applied changes against their baseline windows.
pub struct AbEvaluator {
    config: EvaluationConfig,
}

impl AbEvaluator {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    /// Aggregate the before-window for a change: `window_hours` ending at
    /// the change timestamp.
    pub async fn capture_baseline(
        &self,
        metrics: &dyn MetricSource,
        change: &ParameterChange,
    ) -> DomainResult<MetricSnapshot> {
        let end = change.changed_at;
        let start = end - Duration::hours(i64::from(self.config.window_hours));
        metrics.aggregate(start, end).await
    }

    /// When the after-window for a change has fully elapsed.
    pub fn ready_at(&self, change: &ParameterChange) -> chrono::DateTime<Utc> {
        change.changed_at
            + Duration::hours(i64::from(
                self.config.settle_offset_hours + self.config.window_hours,
            ))
    }

    /// Evaluate a change once its after-window has elapsed.
    ///
    /// The after-window starts `settle_offset_hours` after the change so
    /// transient settling is excluded. Calling before the window has
    /// elapsed returns `EvaluationWindowOpen`.
    pub async fn evaluate(
        &self,
        metrics: &dyn MetricSource,
        change: &ParameterChange,
    ) -> DomainResult<EvaluationOutcome> {
        let ready_at = self.ready_at(change);
        if Utc::now() < ready_at {
            return Err(DomainError::EvaluationWindowOpen { ready_at });
        }

        let before = self.capture_baseline(metrics, change).await?;
        let after_start =
            change.changed_at + Duration::hours(i64::from(self.config.settle_offset_hours));
        let after_end = after_start + Duration::hours(i64::from(self.config.window_hours));
        let after = metrics.aggregate(after_start, after_end).await?;

        Ok(self.score(change, &before, &after))
    }

    /// Score a pair of windows. Pure; no clock or I/O beyond the stamp on
    /// the result record.
    pub fn score(
        &self,
        change: &ParameterChange,
        before: &MetricSnapshot,
        after: &MetricSnapshot,
    ) -> EvaluationOutcome {
        if before.sample_count < self.config.min_samples
            || after.sample_count < self.config.min_samples
        {
            let reason = format!(
                "insufficient samples: before {}, after {}, need {} per window",
                before.sample_count, after.sample_count, self.config.min_samples
            );
            warn!(change_id = %change.id, %reason, "evaluation inconclusive");
            return EvaluationOutcome::Inconclusive {
                change_id: change.id,
                reason,
            };
        }

        let weights = &self.config.weights;
        let scores = ComponentScores {
            efficiency: after.cop_change_pct(before) * 2.0 * weights.efficiency,
            delta_t: self.delta_t_points(before, after),
            comfort: self.comfort_points(before, after),
            cycling: if after.compressor_starts < before.compressor_starts {
                POINTS_PER_WEIGHT * weights.cycling
            } else {
                0.0
            },
            cost: after.cost_reduction_pct(before) * 2.0 * weights.cost,
        };

        let total_score = (BASELINE_SCORE + scores.sum()).clamp(0.0, 100.0);

        let comfort_drift = (after.indoor_temp - before.indoor_temp).abs();
        let mut recommendation = Recommendation::from_score(total_score);
        // Comfort override: a full degree of drift caps the verdict at
        // adjust no matter how good the numbers look.
        if comfort_drift >= COMFORT_OVERRIDE_C && recommendation.is_keep() {
            recommendation = Recommendation::Adjust;
        }

        let weather_divergence = (after.outdoor_temp - before.outdoor_temp).abs();
        let weather_divergent = weather_divergence > self.config.weather_divergence_c;

        let mut summary = format!(
            "{} {:+.2}: COP {:.2} -> {:.2}, delta T {:.1} -> {:.1}, indoor {:.1} -> {:.1}, score {:.0}",
            change.parameter,
            change.delta(),
            before.cop,
            after.cop,
            before.delta_t,
            after.delta_t,
            before.indoor_temp,
            after.indoor_temp,
            total_score,
        );
        if weather_divergent {
            // The flag never suppresses the result; it only qualifies it.
            summary.push_str(&format!(
                " Caution: outdoor conditions diverged by {weather_divergence:.1}C between windows; attribution is uncertain."
            ));
        }

        info!(
            change_id = %change.id,
            total_score,
            recommendation = recommendation.as_str(),
            weather_divergent,
            "experiment scored"
        );

        EvaluationOutcome::Completed(AbTestResult {
            id: Uuid::new_v4(),
            change_id: change.id,
            before: before.clone(),
            after: after.clone(),
            weather_divergent,
            scores,
            total_score,
            recommendation,
            summary,
            evaluated_at: Utc::now(),
        })
    }

    /// Reward moving the thermal differential toward the optimum band
    /// midpoint, proportional to the reduction in distance.
    fn delta_t_points(&self, before: &MetricSnapshot, after: &MetricSnapshot) -> f64 {
        let optimum = self.config.delta_t_optimum();
        let dist_before = (before.delta_t - optimum).abs();
        let dist_after = (after.delta_t - optimum).abs();
        (dist_before - dist_after) * 10.0 * self.config.weights.delta_t
    }

    /// Comfort stability is penalty-only: stable indoor temperature earns
    /// no points, drift loses them.
    fn comfort_points(&self, before: &MetricSnapshot, after: &MetricSnapshot) -> f64 {
        let drift = (after.indoor_temp - before.indoor_temp).abs();
        let credit = if drift < COMFORT_STABLE_C {
            1.0
        } else if drift < COMFORT_OVERRIDE_C {
            0.5
        } else {
            0.0
        };
        (credit - 1.0) * POINTS_PER_WEIGHT * self.config.weights.comfort
    }
}
