//! Engine configuration.
//!
//! Every empirically-tuned constant (comfort floor, step limits, scoring
//! weights, thermal lag) is a configuration field with a serde default, not
//! a hardcoded value; the source system re-tuned most of them more than
//! once.

use serde::{Deserialize, Serialize};

use super::parameter::{ParameterDefinition, ParameterId, ParameterSet};

/// Main configuration structure for curveshift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Tunable parameter definitions.
    #[serde(default = "default_parameters")]
    pub parameters: Vec<ParameterConfig>,

    /// Safety validator configuration.
    #[serde(default)]
    pub safety: SafetyConfig,

    /// A/B evaluation configuration.
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Predictive scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Test prioritizer configuration.
    #[serde(default)]
    pub prioritizer: PrioritizerConfig,

    /// Advisor chain configuration.
    #[serde(default)]
    pub advisors: AdvisorsConfig,

    /// Device control configuration.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parameters: default_parameters(),
            safety: SafetyConfig::default(),
            evaluation: EvaluationConfig::default(),
            scheduler: SchedulerConfig::default(),
            prioritizer: PrioritizerConfig::default(),
            advisors: AdvisorsConfig::default(),
            device: DeviceConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Build the immutable parameter registry from configuration.
    pub fn parameter_set(&self) -> ParameterSet {
        ParameterSet::new(self.parameters.iter().map(ParameterConfig::to_definition).collect())
    }
}

/// Configuration for one tunable parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParameterConfig {
    pub id: ParameterId,
    pub display_name: String,
    pub unit: String,
    pub min: f64,
    pub max: f64,
    pub max_step: f64,
    /// Minimum hours between changes; omit to disable the cooldown rule.
    #[serde(default)]
    pub min_change_interval_hours: Option<f64>,
    /// Indoor degrees Celsius per unit of parameter change.
    #[serde(default)]
    pub comfort_gain: f64,
}

impl ParameterConfig {
    pub fn to_definition(&self) -> ParameterDefinition {
        ParameterDefinition {
            id: self.id,
            display_name: self.display_name.clone(),
            unit: self.unit.clone(),
            min: self.min,
            max: self.max,
            max_step: self.max_step,
            min_change_interval: self
                .min_change_interval_hours
                .map(|h| chrono::Duration::minutes((h * 60.0) as i64)),
            comfort_gain: self.comfort_gain,
        }
    }
}

fn default_parameters() -> Vec<ParameterConfig> {
    vec![
        ParameterConfig {
            id: ParameterId::CurveOffset,
            display_name: "Heating curve offset".to_string(),
            unit: "steps".to_string(),
            min: -10.0,
            max: 10.0,
            max_step: 2.0,
            // Scheduler-driven: must be able to react within the same day.
            min_change_interval_hours: None,
            comfort_gain: 0.3,
        },
        ParameterConfig {
            id: ParameterId::CurveSlope,
            display_name: "Heating curve slope".to_string(),
            unit: "ratio".to_string(),
            min: 0.1,
            max: 1.0,
            max_step: 0.1,
            min_change_interval_hours: Some(48.0),
            comfort_gain: 2.0,
        },
        ParameterConfig {
            id: ParameterId::StartThreshold,
            display_name: "Compressor start threshold".to_string(),
            unit: "degree minutes".to_string(),
            min: -1000.0,
            max: -100.0,
            max_step: 100.0,
            min_change_interval_hours: Some(48.0),
            comfort_gain: 0.0,
        },
        ParameterConfig {
            id: ParameterId::VentilationLevel,
            display_name: "Ventilation level".to_string(),
            unit: "level".to_string(),
            min: 0.0,
            max: 4.0,
            max_step: 1.0,
            min_change_interval_hours: Some(48.0),
            comfort_gain: -0.2,
        },
    ]
}

/// Safety validator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SafetyConfig {
    /// Minimum acceptable predicted indoor temperature, degrees Celsius.
    #[serde(default = "default_comfort_floor")]
    pub comfort_floor_c: f64,

    /// Minimum decision confidence required for application.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

const fn default_comfort_floor() -> f64 {
    20.5
}

const fn default_min_confidence() -> f64 {
    0.70
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            comfort_floor_c: default_comfort_floor(),
            min_confidence: default_min_confidence(),
        }
    }
}

/// Relative weights of the five scoring components.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluationWeights {
    #[serde(default = "default_w_efficiency")]
    pub efficiency: f64,
    #[serde(default = "default_w_delta_t")]
    pub delta_t: f64,
    #[serde(default = "default_w_comfort")]
    pub comfort: f64,
    #[serde(default = "default_w_cycling")]
    pub cycling: f64,
    #[serde(default = "default_w_cost")]
    pub cost: f64,
}

const fn default_w_efficiency() -> f64 {
    0.40
}
const fn default_w_delta_t() -> f64 {
    0.20
}
const fn default_w_comfort() -> f64 {
    0.20
}
const fn default_w_cycling() -> f64 {
    0.10
}
const fn default_w_cost() -> f64 {
    0.10
}

impl Default for EvaluationWeights {
    fn default() -> Self {
        Self {
            efficiency: default_w_efficiency(),
            delta_t: default_w_delta_t(),
            comfort: default_w_comfort(),
            cycling: default_w_cycling(),
            cost: default_w_cost(),
        }
    }
}

/// A/B evaluation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluationConfig {
    /// Length of the before and after windows, hours.
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,

    /// Hours after the change excluded from the after-window, so that
    /// transient settling is not measured.
    #[serde(default = "default_settle_offset_hours")]
    pub settle_offset_hours: u32,

    /// Minimum telemetry samples per window for a conclusive result.
    #[serde(default = "default_min_samples")]
    pub min_samples: u32,

    /// Outdoor temperature divergence that flags the result as uncertain.
    #[serde(default = "default_weather_divergence")]
    pub weather_divergence_c: f64,

    /// Optimum delta T band, degrees Celsius.
    #[serde(default = "default_delta_t_low")]
    pub delta_t_low: f64,
    #[serde(default = "default_delta_t_high")]
    pub delta_t_high: f64,

    #[serde(default)]
    pub weights: EvaluationWeights,

    /// Short feedback horizon for the scheduler, hours.
    #[serde(default = "default_short_window_hours")]
    pub short_window_hours: u32,
}

const fn default_window_hours() -> u32 {
    48
}
const fn default_settle_offset_hours() -> u32 {
    1
}
const fn default_min_samples() -> u32 {
    12
}
const fn default_weather_divergence() -> f64 {
    3.0
}
const fn default_delta_t_low() -> f64 {
    5.0
}
const fn default_delta_t_high() -> f64 {
    7.0
}
const fn default_short_window_hours() -> u32 {
    6
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            settle_offset_hours: default_settle_offset_hours(),
            min_samples: default_min_samples(),
            weather_divergence_c: default_weather_divergence(),
            delta_t_low: default_delta_t_low(),
            delta_t_high: default_delta_t_high(),
            weights: EvaluationWeights::default(),
            short_window_hours: default_short_window_hours(),
        }
    }
}

impl EvaluationConfig {
    /// Midpoint of the optimum delta T band.
    pub fn delta_t_optimum(&self) -> f64 {
        (self.delta_t_low + self.delta_t_high) / 2.0
    }
}

/// Predictive scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Measured thermal time constant of the building, hours. Typical
    /// residential thermal mass lands between 2 and 4.
    #[serde(default = "default_thermal_lag_hours")]
    pub thermal_lag_hours: f64,

    /// How far ahead to act on a forecast condition; defaults to the
    /// thermal lag when omitted.
    #[serde(default)]
    pub lead_time_hours: Option<f64>,

    /// Forecasts older than this are treated as unavailable.
    #[serde(default = "default_max_forecast_age_hours")]
    pub max_forecast_age_hours: f64,

    /// Total outdoor movement over the lead window that counts as a trend.
    #[serde(default = "default_trend_threshold")]
    pub trend_threshold_c: f64,

    /// Size of one scheduler step, in curve offset units.
    #[serde(default = "default_step_size")]
    pub step_size: f64,

    /// Confidence attached to matrix-driven proposals before feedback bias.
    #[serde(default = "default_scheduler_confidence")]
    pub base_confidence: f64,
}

const fn default_thermal_lag_hours() -> f64 {
    3.0
}
const fn default_max_forecast_age_hours() -> f64 {
    6.0
}
const fn default_trend_threshold() -> f64 {
    1.5
}
const fn default_step_size() -> f64 {
    1.0
}
const fn default_scheduler_confidence() -> f64 {
    0.75
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thermal_lag_hours: default_thermal_lag_hours(),
            lead_time_hours: None,
            max_forecast_age_hours: default_max_forecast_age_hours(),
            trend_threshold_c: default_trend_threshold(),
            step_size: default_step_size(),
            base_confidence: default_scheduler_confidence(),
        }
    }
}

impl SchedulerConfig {
    /// Effective lead time: configured value or the thermal lag.
    pub fn lead_time(&self) -> f64 {
        self.lead_time_hours.unwrap_or(self.thermal_lag_hours)
    }
}

/// Relative weights of the priority score terms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PriorityWeights {
    #[serde(default = "default_w_gain")]
    pub expected_gain: f64,
    #[serde(default = "default_w_confidence")]
    pub confidence: f64,
    #[serde(default = "default_w_safety_margin")]
    pub safety_margin: f64,
    #[serde(default = "default_w_simplicity")]
    pub simplicity: f64,
}

const fn default_w_gain() -> f64 {
    0.30
}
const fn default_w_confidence() -> f64 {
    0.20
}
const fn default_w_safety_margin() -> f64 {
    0.15
}
const fn default_w_simplicity() -> f64 {
    0.10
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            expected_gain: default_w_gain(),
            confidence: default_w_confidence(),
            safety_margin: default_w_safety_margin(),
            simplicity: default_w_simplicity(),
        }
    }
}

/// Test prioritizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PrioritizerConfig {
    #[serde(default)]
    pub weights: PriorityWeights,

    /// Confidence multiplier for candidates repeating a change that
    /// recently scored below neutral.
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f64,

    /// How far back to look for conflicting history, hours.
    #[serde(default = "default_history_lookback_hours")]
    pub history_lookback_hours: u32,

    /// Maximum backlog entries kept after reprioritization.
    #[serde(default = "default_max_backlog")]
    pub max_backlog: usize,
}

const fn default_repeat_penalty() -> f64 {
    0.5
}
const fn default_history_lookback_hours() -> u32 {
    24
}
const fn default_max_backlog() -> usize {
    10
}

impl Default for PrioritizerConfig {
    fn default() -> Self {
        Self {
            weights: PriorityWeights::default(),
            repeat_penalty: default_repeat_penalty(),
            history_lookback_hours: default_history_lookback_hours(),
            max_backlog: default_max_backlog(),
        }
    }
}

/// Advisor chain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdvisorsConfig {
    /// Provider names tried in order; the first success wins.
    #[serde(default = "default_providers")]
    pub providers: Vec<String>,

    /// Anthropic provider settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,
}

fn default_providers() -> Vec<String> {
    vec!["anthropic".to_string(), "heuristic".to_string()]
}

impl Default for AdvisorsConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            anthropic: AnthropicConfig::default(),
        }
    }
}

/// Anthropic advisor provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnthropicConfig {
    /// API key; read from ANTHROPIC_API_KEY when omitted.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,

    #[serde(default = "default_anthropic_model")]
    pub model: String,

    #[serde(default = "default_anthropic_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_anthropic_max_tokens")]
    pub max_tokens: u32,

    /// Client-side request ceiling per minute.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

const fn default_anthropic_timeout() -> u64 {
    60
}

const fn default_anthropic_max_tokens() -> u32 {
    1024
}

const fn default_requests_per_minute() -> u32 {
    10
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_anthropic_base_url(),
            model: default_anthropic_model(),
            timeout_secs: default_anthropic_timeout(),
            max_tokens: default_anthropic_max_tokens(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

/// Device control configuration.
///
/// When both commands are set, writes go through the external apply
/// command; otherwise the engine runs against the in-memory dry-run
/// device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeviceConfig {
    /// Command that prints the current device state as JSON.
    #[serde(default)]
    pub read_command: Option<String>,

    /// Command invoked as `<command> <parameter> <value>`; a non-zero exit
    /// is a rejected write.
    #[serde(default)]
    pub apply_command: Option<String>,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to the `SQLite` database file.
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".curveshift/curveshift.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling file output; stderr only when omitted.
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameter_set_is_complete() {
        let set = Config::default().parameter_set();
        for id in ParameterId::all() {
            assert!(set.get(id).is_some(), "missing definition for {id}");
        }
    }

    #[test]
    fn test_cooldown_policy_split() {
        let set = Config::default().parameter_set();
        // The scheduler-driven offset has no cooldown; A/B-only parameters do.
        assert!(set.get(ParameterId::CurveOffset).unwrap().min_change_interval.is_none());
        assert!(set.get(ParameterId::CurveSlope).unwrap().min_change_interval.is_some());
    }

    #[test]
    fn test_lead_time_defaults_to_thermal_lag() {
        let mut cfg = SchedulerConfig::default();
        assert!((cfg.lead_time() - cfg.thermal_lag_hours).abs() < f64::EPSILON);
        cfg.lead_time_hours = Some(2.0);
        assert!((cfg.lead_time() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_delta_t_optimum_is_band_midpoint() {
        let cfg = EvaluationConfig::default();
        assert!((cfg.delta_t_optimum() - 6.0).abs() < f64::EPSILON);
    }
}
