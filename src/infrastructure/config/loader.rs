use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Parameter '{parameter}' has invalid bounds: min {min} must be below max {max}")]
    InvalidParameterBounds {
        parameter: String,
        min: f64,
        max: f64,
    },

    #[error("Parameter '{parameter}' has non-positive max_step {max_step}")]
    InvalidMaxStep { parameter: String, max_step: f64 },

    #[error("Invalid confidence threshold: {0}. Must be within [0, 1]")]
    InvalidConfidenceThreshold(f64),

    #[error("Invalid thermal lag: {0} hours. Must be positive")]
    InvalidThermalLag(f64),

    #[error("Invalid evaluation window: {0} hours. Must be at least 1")]
    InvalidEvaluationWindow(u32),

    #[error("Delta T band [{low}, {high}] is inverted")]
    InvalidDeltaTBand { low: f64, high: f64 },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .curveshift/config.yaml (project config)
    /// 3. .curveshift/local.yaml (local overrides, optional)
    /// 4. Environment variables (CURVESHIFT_* prefix, highest priority)
    ///
    /// Configuration is always directory-local to support running several
    /// installations from one machine.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".curveshift/config.yaml"))
            .merge(Yaml::file(".curveshift/local.yaml"))
            .merge(Env::prefixed("CURVESHIFT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        for parameter in &config.parameters {
            if parameter.min >= parameter.max {
                return Err(ConfigError::InvalidParameterBounds {
                    parameter: parameter.id.to_string(),
                    min: parameter.min,
                    max: parameter.max,
                });
            }
            if parameter.max_step <= 0.0 {
                return Err(ConfigError::InvalidMaxStep {
                    parameter: parameter.id.to_string(),
                    max_step: parameter.max_step,
                });
            }
        }

        if !(0.0..=1.0).contains(&config.safety.min_confidence) {
            return Err(ConfigError::InvalidConfidenceThreshold(
                config.safety.min_confidence,
            ));
        }

        if config.scheduler.thermal_lag_hours <= 0.0 {
            return Err(ConfigError::InvalidThermalLag(
                config.scheduler.thermal_lag_hours,
            ));
        }

        if config.evaluation.window_hours == 0 {
            return Err(ConfigError::InvalidEvaluationWindow(
                config.evaluation.window_hours,
            ));
        }

        if config.evaluation.delta_t_low >= config.evaluation.delta_t_high {
            return Err(ConfigError::InvalidDeltaTBand {
                low: config.evaluation.delta_t_low,
                high: config.evaluation.delta_t_high,
            });
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.advisors.providers.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "advisor provider list cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
