//! Deterministic rule-set advisor.
//!
//! Pattern-matches metric thresholds to known remedies. Serves as the
//! always-available tail of the fallback chain and as the non-LLM path for
//! candidate generation; its output goes through the same schema gate as
//! every other provider.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EvaluationConfig, ParameterId, SafetyConfig};
use crate::domain::ports::{Advisor, AdvisorContext, AdvisorProposal, ProposalAction};

/// Compressor starts per hour above which cycling is considered excessive.
const EXCESSIVE_STARTS_PER_HOUR: f64 = 3.0;

/// Indoor headroom above the comfort floor beyond which offset can come
/// down without comfort risk.
const COMFORT_SURPLUS_C: f64 = 1.5;

pub struct HeuristicAdvisor {
    evaluation: EvaluationConfig,
    safety: SafetyConfig,
}

impl HeuristicAdvisor {
    pub fn new(evaluation: EvaluationConfig, safety: SafetyConfig) -> Self {
        Self { evaluation, safety }
    }

    fn adjust(
        parameter: ParameterId,
        current: f64,
        suggested: f64,
        reasoning: impl Into<String>,
        confidence: f64,
        expected_impact: f64,
    ) -> AdvisorProposal {
        AdvisorProposal {
            action: ProposalAction::Adjust,
            parameter: Some(parameter.as_str().to_string()),
            current_value: Some(current),
            suggested_value: Some(suggested),
            reasoning: reasoning.into(),
            confidence,
            expected_impact,
        }
    }
}

#[async_trait]
impl Advisor for HeuristicAdvisor {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn propose(&self, context: &AdvisorContext<'_>) -> DomainResult<AdvisorProposal> {
        let metrics = context.metrics;
        let state = context.state;

        // Low delta T: heat transfer is underexploited; a steeper curve
        // raises the supply temperature spread.
        if metrics.delta_t < self.evaluation.delta_t_low {
            if let (Some(current), Some(def)) = (
                state.value_of(ParameterId::CurveSlope),
                context.parameters.get(ParameterId::CurveSlope),
            ) {
                let suggested = (current + def.max_step / 2.0).min(def.max);
                if suggested > current {
                    return Ok(Self::adjust(
                        ParameterId::CurveSlope,
                        current,
                        suggested,
                        format!(
                            "delta T {:.1}C sits below the {:.1}-{:.1}C band; a steeper curve should improve heat transfer",
                            metrics.delta_t, self.evaluation.delta_t_low, self.evaluation.delta_t_high
                        ),
                        0.75,
                        0.3,
                    ));
                }
            }
        }

        // High delta T: flow likely throttled or the curve too steep.
        if metrics.delta_t > self.evaluation.delta_t_high {
            if let (Some(current), Some(def)) = (
                state.value_of(ParameterId::CurveSlope),
                context.parameters.get(ParameterId::CurveSlope),
            ) {
                let suggested = (current - def.max_step / 2.0).max(def.min);
                if suggested < current {
                    return Ok(Self::adjust(
                        ParameterId::CurveSlope,
                        current,
                        suggested,
                        format!(
                            "delta T {:.1}C sits above the {:.1}-{:.1}C band; a flatter curve should relax it",
                            metrics.delta_t, self.evaluation.delta_t_low, self.evaluation.delta_t_high
                        ),
                        0.7,
                        0.25,
                    ));
                }
            }
        }

        // Excessive cycling wears the compressor; widening the start
        // threshold lets degree minutes accumulate longer between starts.
        let hours = metrics.window_hours().max(1) as f64;
        let starts_per_hour = f64::from(metrics.compressor_starts) / hours;
        if starts_per_hour > EXCESSIVE_STARTS_PER_HOUR {
            if let (Some(current), Some(def)) = (
                state.value_of(ParameterId::StartThreshold),
                context.parameters.get(ParameterId::StartThreshold),
            ) {
                let suggested = (current - def.max_step / 2.0).max(def.min);
                if suggested < current {
                    return Ok(Self::adjust(
                        ParameterId::StartThreshold,
                        current,
                        suggested,
                        format!(
                            "{starts_per_hour:.1} compressor starts/h indicates short cycling; widening the start threshold should lengthen run times"
                        ),
                        0.8,
                        0.35,
                    ));
                }
            }
        }

        // Comfort surplus: the house runs warmer than it needs to; shave
        // the offset and bank the savings.
        if state.indoor_temp > self.safety.comfort_floor_c + COMFORT_SURPLUS_C {
            if let (Some(current), Some(def)) = (
                state.value_of(ParameterId::CurveOffset),
                context.parameters.get(ParameterId::CurveOffset),
            ) {
                let suggested = (current - 1.0).max(def.min);
                if suggested < current {
                    return Ok(Self::adjust(
                        ParameterId::CurveOffset,
                        current,
                        suggested,
                        format!(
                            "indoor {:.1}C runs {:.1}C above the comfort floor; a lower offset should save energy without comfort risk",
                            state.indoor_temp,
                            state.indoor_temp - self.safety.comfort_floor_c
                        ),
                        0.7,
                        0.2,
                    ));
                }
            }
        }

        Ok(AdvisorProposal {
            action: ProposalAction::Hold,
            parameter: None,
            current_value: None,
            suggested_value: None,
            reasoning: "metrics within expected ranges; no remedy pattern matched".to_string(),
            confidence: 0.9,
            expected_impact: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Config, DeviceState, MetricSnapshot, SafetyConfig};
    use chrono::Utc;
    use std::collections::HashMap;

    fn advisor() -> HeuristicAdvisor {
        HeuristicAdvisor::new(EvaluationConfig::default(), SafetyConfig::default())
    }

    fn metrics(delta_t: f64, starts: u32, window_hours: i64) -> MetricSnapshot {
        MetricSnapshot {
            cop: 3.0,
            delta_t,
            indoor_temp: 21.0,
            outdoor_temp: 2.0,
            compressor_starts: starts,
            energy_cost: 50.0,
            sample_count: 12,
            window_start: Utc::now() - chrono::Duration::hours(window_hours),
            window_end: Utc::now(),
        }
    }

    fn state(indoor: f64) -> DeviceState {
        let mut values = HashMap::new();
        values.insert(ParameterId::CurveOffset, 0.0);
        values.insert(ParameterId::CurveSlope, 0.4);
        values.insert(ParameterId::StartThreshold, -300.0);
        values.insert(ParameterId::VentilationLevel, 2.0);
        DeviceState {
            values,
            indoor_temp: indoor,
            read_at: Utc::now(),
        }
    }

    async fn run(metrics: &MetricSnapshot, state: &DeviceState) -> AdvisorProposal {
        let params = Config::default().parameter_set();
        let context = AdvisorContext {
            metrics,
            state,
            parameters: &params,
            history: &[],
            evaluated: &[],
        };
        advisor().propose(&context).await.unwrap()
    }

    #[tokio::test]
    async fn test_low_delta_t_raises_slope() {
        let proposal = run(&metrics(3.5, 10, 6), &state(21.0)).await;
        assert_eq!(proposal.action, ProposalAction::Adjust);
        assert_eq!(proposal.parameter.as_deref(), Some("curve_slope"));
        assert!(proposal.suggested_value.unwrap() > proposal.current_value.unwrap());
    }

    #[tokio::test]
    async fn test_high_delta_t_lowers_slope() {
        let proposal = run(&metrics(8.5, 10, 6), &state(21.0)).await;
        assert_eq!(proposal.parameter.as_deref(), Some("curve_slope"));
        assert!(proposal.suggested_value.unwrap() < proposal.current_value.unwrap());
    }

    #[tokio::test]
    async fn test_short_cycling_widens_start_threshold() {
        let proposal = run(&metrics(6.0, 30, 6), &state(21.0)).await;
        assert_eq!(proposal.parameter.as_deref(), Some("start_threshold"));
        assert!(proposal.suggested_value.unwrap() < -300.0);
    }

    #[tokio::test]
    async fn test_comfort_surplus_lowers_offset() {
        let proposal = run(&metrics(6.0, 10, 6), &state(23.0)).await;
        assert_eq!(proposal.parameter.as_deref(), Some("curve_offset"));
        assert!((proposal.suggested_value.unwrap() + 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nominal_metrics_hold() {
        let proposal = run(&metrics(6.0, 10, 6), &state(21.0)).await;
        assert_eq!(proposal.action, ProposalAction::Hold);
    }

    #[tokio::test]
    async fn test_output_passes_schema_gate() {
        let params = Config::default().parameter_set();
        for snapshot in [metrics(3.5, 10, 6), metrics(8.5, 10, 6), metrics(6.0, 30, 6)] {
            let proposal = run(&snapshot, &state(21.0)).await;
            proposal.validate(&params).expect("heuristic output must be schema-clean");
        }
    }
}
