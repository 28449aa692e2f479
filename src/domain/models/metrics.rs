//! Window-aggregated operating metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed-shape summary of appliance telemetry over one time window.
///
/// Produced on demand by a metric source; the engine consumes snapshots
/// transiently and only persists them embedded inside an A/B test result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Coefficient of performance: heat delivered / energy consumed.
    pub cop: f64,
    /// Supply minus return fluid temperature, degrees Celsius.
    pub delta_t: f64,
    /// Mean indoor temperature, degrees Celsius.
    pub indoor_temp: f64,
    /// Mean outdoor temperature, degrees Celsius.
    pub outdoor_temp: f64,
    /// Compressor starts during the window.
    pub compressor_starts: u32,
    /// Estimated energy cost for the window.
    pub energy_cost: f64,
    /// Number of telemetry samples the aggregate was computed from.
    pub sample_count: u32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl MetricSnapshot {
    /// Percentage change of COP relative to `baseline`, e.g. `10.0` for a
    /// ten percent improvement. Zero when the baseline COP is zero.
    pub fn cop_change_pct(&self, baseline: &Self) -> f64 {
        if baseline.cop == 0.0 {
            return 0.0;
        }
        (self.cop - baseline.cop) / baseline.cop * 100.0
    }

    /// Percentage cost reduction relative to `baseline`; positive when this
    /// window was cheaper.
    pub fn cost_reduction_pct(&self, baseline: &Self) -> f64 {
        if baseline.energy_cost == 0.0 {
            return 0.0;
        }
        (baseline.energy_cost - self.energy_cost) / baseline.energy_cost * 100.0
    }

    /// Window length in whole hours.
    pub fn window_hours(&self) -> i64 {
        (self.window_end - self.window_start).num_hours()
    }
}
