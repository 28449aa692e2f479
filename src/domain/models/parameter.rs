//! Tunable parameter reference data.
//!
//! The engine adjusts a small, closed set of heat pump setpoints. Bounds,
//! step limits, and the per-parameter cooldown policy live here; they are
//! built from configuration once per process and never mutated afterward.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a tunable control parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterId {
    /// Parallel offset of the heating curve.
    CurveOffset,
    /// Slope of the heating curve.
    CurveSlope,
    /// Degree-minute threshold at which the compressor starts.
    StartThreshold,
    /// Ventilation aggressiveness level.
    VentilationLevel,
}

impl ParameterId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurveOffset => "curve_offset",
            Self::CurveSlope => "curve_slope",
            Self::StartThreshold => "start_threshold",
            Self::VentilationLevel => "ventilation_level",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "curve_offset" => Some(Self::CurveOffset),
            "curve_slope" => Some(Self::CurveSlope),
            "start_threshold" => Some(Self::StartThreshold),
            "ventilation_level" => Some(Self::VentilationLevel),
            _ => None,
        }
    }

    /// All known parameters, in display order.
    pub fn all() -> [Self; 4] {
        [
            Self::CurveOffset,
            Self::CurveSlope,
            Self::StartThreshold,
            Self::VentilationLevel,
        ]
    }
}

impl std::fmt::Display for ParameterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable reference data for one tunable parameter. Built from
/// configuration at startup; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub id: ParameterId,
    /// Human-readable name for log output.
    pub display_name: String,
    /// Unit string, e.g. "steps" or "degree minutes".
    pub unit: String,
    /// Inclusive lower bound.
    pub min: f64,
    /// Inclusive upper bound.
    pub max: f64,
    /// Maximum allowed |new - old| per change.
    pub max_step: f64,
    /// Minimum time between changes. `None` disables the cooldown rule,
    /// which is the policy for parameters driven by the predictive
    /// scheduler; parameters evaluated only through the 48 h A/B cycle
    /// carry a mandatory interval.
    pub min_change_interval: Option<Duration>,
    /// Predicted indoor temperature change per unit of parameter change,
    /// in degrees Celsius. Zero means the parameter has no causal effect
    /// on comfort and the comfort-floor rule is skipped.
    pub comfort_gain: f64,
}

impl ParameterDefinition {
    /// Whether `value` lies within `[min, max]`.
    pub fn in_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Whether a move from `current` to `proposed` respects the step limit.
    pub fn within_step(&self, current: f64, proposed: f64) -> bool {
        (proposed - current).abs() <= self.max_step
    }

    /// Whether this parameter causally affects indoor temperature.
    pub fn affects_comfort(&self) -> bool {
        self.comfort_gain != 0.0
    }

    /// Predicted indoor temperature after moving from `current` to
    /// `proposed`, given the current indoor reading. Simple linear model.
    pub fn predicted_comfort(&self, indoor_temp: f64, current: f64, proposed: f64) -> f64 {
        indoor_temp + (proposed - current) * self.comfort_gain
    }
}

/// Registry of parameter definitions, keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    definitions: HashMap<ParameterId, ParameterDefinition>,
}

impl ParameterSet {
    pub fn new(definitions: Vec<ParameterDefinition>) -> Self {
        Self {
            definitions: definitions.into_iter().map(|d| (d.id, d)).collect(),
        }
    }

    pub fn get(&self, id: ParameterId) -> Option<&ParameterDefinition> {
        self.definitions.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Snapshot of the controlled device, read fresh at the start of every
/// invocation. Never cached across cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Current value of each tunable parameter.
    pub values: HashMap<ParameterId, f64>,
    /// Current indoor temperature in degrees Celsius.
    pub indoor_temp: f64,
    /// When the state was read.
    pub read_at: DateTime<Utc>,
}

impl DeviceState {
    pub fn value_of(&self, id: ParameterId) -> Option<f64> {
        self.values.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_definition() -> ParameterDefinition {
        ParameterDefinition {
            id: ParameterId::CurveOffset,
            display_name: "Heating curve offset".to_string(),
            unit: "steps".to_string(),
            min: -10.0,
            max: 10.0,
            max_step: 2.0,
            min_change_interval: None,
            comfort_gain: 0.3,
        }
    }

    #[test]
    fn test_parameter_id_round_trip() {
        for id in ParameterId::all() {
            assert_eq!(ParameterId::from_str(id.as_str()), Some(id));
        }
        assert_eq!(ParameterId::from_str("boiler_pressure"), None);
    }

    #[test]
    fn test_bounds_and_step() {
        let def = offset_definition();
        assert!(def.in_bounds(-10.0));
        assert!(def.in_bounds(10.0));
        assert!(!def.in_bounds(10.1));
        assert!(def.within_step(-3.0, -5.0));
        assert!(!def.within_step(-3.0, -9.0));
    }

    #[test]
    fn test_predicted_comfort_linear() {
        let def = offset_definition();
        let predicted = def.predicted_comfort(21.0, 0.0, -2.0);
        assert!((predicted - 20.4).abs() < 1e-9);
    }

    #[test]
    fn test_parameter_set_lookup() {
        let set = ParameterSet::new(vec![offset_definition()]);
        assert!(set.get(ParameterId::CurveOffset).is_some());
        assert!(set.get(ParameterId::CurveSlope).is_none());
        assert_eq!(set.len(), 1);
    }
}
