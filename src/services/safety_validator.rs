//! Safety validator for proposed parameter changes.
//!
//! Every decision passes through here before touching the device,
//! regardless of whether it came from the scheduler, a rule, an advisor,
//! or an operator. Pure and deterministic: same inputs, same verdict, no
//! I/O.

use chrono::Utc;

use crate::domain::models::{
    Decision, DeviceState, ParameterChange, ParameterSet, SafetyConfig,
};

/// Result of a validation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The decision may be applied.
    Accepted,
    /// The decision must not be applied; the reason is logged.
    Rejected(String),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Accepted => None,
            Self::Rejected(reason) => Some(reason),
        }
    }
}

/// Deterministic gate applying the safety rules in a fixed order. The
/// first failing rule short-circuits with its reason.
#[derive(Debug, Clone)]
pub struct SafetyValidator {
    config: SafetyConfig,
}

impl SafetyValidator {
    pub fn new(config: SafetyConfig) -> Self {
        Self { config }
    }

    /// Validate a decision against the parameter definitions, the fresh
    /// device state, and the most recent change for the target parameter.
    ///
    /// Rule order: bounds, step limit, comfort floor, confidence,
    /// per-parameter cooldown. Hold decisions are trivially accepted;
    /// the engine never applies them anyway.
    pub fn validate(
        &self,
        decision: &Decision,
        parameters: &ParameterSet,
        state: &DeviceState,
        last_change: Option<&ParameterChange>,
    ) -> Verdict {
        let (parameter, suggested) = match decision {
            Decision::Hold { .. } => return Verdict::Accepted,
            Decision::Adjust {
                parameter,
                suggested_value,
                ..
            } => (*parameter, *suggested_value),
        };

        let Some(definition) = parameters.get(parameter) else {
            return Verdict::Rejected(format!("no definition for parameter {parameter}"));
        };

        // Rule 1: bounds.
        if !definition.in_bounds(suggested) {
            return Verdict::Rejected(format!(
                "{} value {:.2} outside bounds [{:.2}, {:.2}]",
                definition.display_name, suggested, definition.min, definition.max
            ));
        }

        // Rule 2: step limit, measured against the value on the device,
        // not the one the proposer believed.
        let Some(current) = state.value_of(parameter) else {
            return Verdict::Rejected(format!(
                "device state has no reading for {}",
                definition.display_name
            ));
        };
        if !definition.within_step(current, suggested) {
            return Verdict::Rejected(format!(
                "step of {:.2} exceeds max step {:.2} for {}",
                (suggested - current).abs(),
                definition.max_step,
                definition.display_name
            ));
        }

        // Rule 3: comfort floor, for parameters that causally affect
        // indoor temperature.
        if definition.affects_comfort() {
            let predicted = definition.predicted_comfort(state.indoor_temp, current, suggested);
            if predicted < self.config.comfort_floor_c {
                return Verdict::Rejected(format!(
                    "predicted indoor temperature {:.1}C below comfort floor {:.1}C",
                    predicted, self.config.comfort_floor_c
                ));
            }
        }

        // Rule 4: confidence threshold.
        if decision.confidence() < self.config.min_confidence {
            return Verdict::Rejected(format!(
                "confidence {:.2} below threshold {:.2}",
                decision.confidence(),
                self.config.min_confidence
            ));
        }

        // Rule 5: per-parameter cooldown, when configured.
        if let (Some(interval), Some(last)) = (definition.min_change_interval, last_change) {
            let elapsed = Utc::now() - last.changed_at;
            if elapsed < interval {
                return Verdict::Rejected(format!(
                    "{} changed {}h ago; minimum interval is {}h",
                    definition.display_name,
                    elapsed.num_hours(),
                    interval.num_hours()
                ));
            }
        }

        Verdict::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ChangeOrigin, Config, ParameterId};
    use chrono::Duration;
    use std::collections::HashMap;

    fn state_with(parameter: ParameterId, value: f64, indoor: f64) -> DeviceState {
        let mut values = HashMap::new();
        values.insert(parameter, value);
        DeviceState {
            values,
            indoor_temp: indoor,
            read_at: Utc::now(),
        }
    }

    fn adjust(parameter: ParameterId, current: f64, suggested: f64, confidence: f64) -> Decision {
        Decision::Adjust {
            parameter,
            current_value: current,
            suggested_value: suggested,
            confidence,
            reasoning: "test".to_string(),
        }
    }

    fn validator() -> SafetyValidator {
        SafetyValidator::new(SafetyConfig::default())
    }

    fn params() -> ParameterSet {
        Config::default().parameter_set()
    }

    #[test]
    fn test_step_limit_rejects_with_reason() {
        // Bounds [-10, 10], max step 2, current -3: -9 is a 6-unit jump.
        let state = state_with(ParameterId::CurveOffset, -3.0, 22.0);
        let decision = adjust(ParameterId::CurveOffset, -3.0, -9.0, 0.9);
        let verdict = validator().validate(&decision, &params(), &state, None);
        let reason = verdict.reason().expect("should be rejected");
        assert!(reason.contains("step"), "reason should mention step: {reason}");
    }

    #[test]
    fn test_within_step_accepted() {
        let state = state_with(ParameterId::CurveOffset, -3.0, 22.0);
        let decision = adjust(ParameterId::CurveOffset, -3.0, -5.0, 0.9);
        assert!(validator()
            .validate(&decision, &params(), &state, None)
            .is_accepted());
    }

    #[test]
    fn test_bounds_rejected_before_step() {
        let state = state_with(ParameterId::CurveOffset, 9.0, 22.0);
        let decision = adjust(ParameterId::CurveOffset, 9.0, 11.0, 0.9);
        let verdict = validator().validate(&decision, &params(), &state, None);
        assert!(verdict.reason().unwrap().contains("bounds"));
    }

    #[test]
    fn test_comfort_floor_blocks_cold_move() {
        // Indoor at 21.0, comfort gain 0.3/unit: dropping the offset by 2
        // predicts 20.4, below the 20.5 floor.
        let state = state_with(ParameterId::CurveOffset, 0.0, 21.0);
        let decision = adjust(ParameterId::CurveOffset, 0.0, -2.0, 0.9);
        let verdict = validator().validate(&decision, &params(), &state, None);
        assert!(verdict.reason().unwrap().contains("comfort floor"));
    }

    #[test]
    fn test_comfort_rule_skipped_for_non_comfort_parameter() {
        // Start threshold has zero comfort gain; a large move passes even
        // with a cool house.
        let state = state_with(ParameterId::StartThreshold, -300.0, 20.6);
        let decision = adjust(ParameterId::StartThreshold, -300.0, -400.0, 0.9);
        assert!(validator()
            .validate(&decision, &params(), &state, None)
            .is_accepted());
    }

    #[test]
    fn test_low_confidence_rejected() {
        let state = state_with(ParameterId::CurveOffset, 0.0, 22.0);
        let decision = adjust(ParameterId::CurveOffset, 0.0, 1.0, 0.5);
        let verdict = validator().validate(&decision, &params(), &state, None);
        assert!(verdict.reason().unwrap().contains("confidence"));
    }

    #[test]
    fn test_cooldown_enforced_when_configured() {
        let state = state_with(ParameterId::CurveSlope, 0.4, 22.0);
        let decision = adjust(ParameterId::CurveSlope, 0.4, 0.5, 0.9);
        let mut last = ParameterChange::new(
            ParameterId::CurveSlope,
            0.3,
            0.4,
            "previous",
            ChangeOrigin::Rule,
        );
        last.changed_at = Utc::now() - Duration::hours(10);

        let verdict = validator().validate(&decision, &params(), &state, Some(&last));
        assert!(verdict.reason().unwrap().contains("interval"));

        // Old enough and the same decision passes.
        last.changed_at = Utc::now() - Duration::hours(72);
        assert!(validator()
            .validate(&decision, &params(), &state, Some(&last))
            .is_accepted());
    }

    #[test]
    fn test_no_cooldown_for_scheduler_parameter() {
        // Curve offset carries no min interval; a change minutes ago does
        // not block the next one.
        let state = state_with(ParameterId::CurveOffset, 0.0, 22.0);
        let decision = adjust(ParameterId::CurveOffset, 0.0, 1.0, 0.9);
        let last = ParameterChange::new(
            ParameterId::CurveOffset,
            -1.0,
            0.0,
            "previous",
            ChangeOrigin::Rule,
        );
        assert!(validator()
            .validate(&decision, &params(), &state, Some(&last))
            .is_accepted());
    }

    #[test]
    fn test_hold_is_trivially_accepted() {
        let state = state_with(ParameterId::CurveOffset, 0.0, 22.0);
        let decision = Decision::Hold {
            reasoning: "forecast stale".to_string(),
        };
        assert!(validator()
            .validate(&decision, &params(), &state, None)
            .is_accepted());
    }
}
