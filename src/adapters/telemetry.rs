//! Telemetry bundle adapter.
//!
//! The engine is triggered by the surrounding system and supplied its
//! inputs; this adapter accepts those inputs as one JSON document of raw
//! telemetry samples and forecasts, and serves the `MetricSource` and
//! `ForecastSource` ports from it. Aggregation over a window is a plain
//! mean/sum over the samples inside it, which keeps re-aggregating a
//! window byte-for-byte reproducible.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    DeviceState, Forecast, MetricSnapshot, PricePoint, WeatherPoint,
};
use crate::domain::ports::{ForecastSource, MetricSource};

/// One raw telemetry sample, typically an hourly reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub at: DateTime<Utc>,
    pub cop: f64,
    pub delta_t: f64,
    pub indoor_temp: f64,
    pub outdoor_temp: f64,
    /// Compressor starts since the previous sample.
    #[serde(default)]
    pub compressor_starts: u32,
    /// Energy cost since the previous sample.
    #[serde(default)]
    pub energy_cost: f64,
}

/// The full input document handed to one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryBundle {
    #[serde(default)]
    pub samples: Vec<TelemetrySample>,
    #[serde(default)]
    pub price_forecast: Option<Forecast<PricePoint>>,
    #[serde(default)]
    pub weather_forecast: Option<Forecast<WeatherPoint>>,
    /// Optional device state override for dry runs.
    #[serde(default)]
    pub device_state: Option<DeviceState>,
}

impl TelemetryBundle {
    pub fn from_json(json: &str) -> DomainResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }
}

/// Serves windowed aggregates from bundle samples.
pub struct BundleMetricSource {
    samples: Vec<TelemetrySample>,
}

impl BundleMetricSource {
    pub fn new(samples: Vec<TelemetrySample>) -> Self {
        Self { samples }
    }
}

#[async_trait]
impl MetricSource for BundleMetricSource {
    async fn aggregate(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> DomainResult<MetricSnapshot> {
        let window: Vec<&TelemetrySample> = self
            .samples
            .iter()
            .filter(|s| s.at >= window_start && s.at <= window_end)
            .collect();

        let count = window.len() as u32;
        if count == 0 {
            // An empty window is still a snapshot; the evaluator's sample
            // floor decides whether it is usable.
            return Ok(MetricSnapshot {
                cop: 0.0,
                delta_t: 0.0,
                indoor_temp: 0.0,
                outdoor_temp: 0.0,
                compressor_starts: 0,
                energy_cost: 0.0,
                sample_count: 0,
                window_start,
                window_end,
            });
        }

        let n = f64::from(count);
        Ok(MetricSnapshot {
            cop: window.iter().map(|s| s.cop).sum::<f64>() / n,
            delta_t: window.iter().map(|s| s.delta_t).sum::<f64>() / n,
            indoor_temp: window.iter().map(|s| s.indoor_temp).sum::<f64>() / n,
            outdoor_temp: window.iter().map(|s| s.outdoor_temp).sum::<f64>() / n,
            compressor_starts: window.iter().map(|s| s.compressor_starts).sum(),
            energy_cost: window.iter().map(|s| s.energy_cost).sum(),
            sample_count: count,
            window_start,
            window_end,
        })
    }
}

/// Serves forecasts from the bundle; a missing forecast is the
/// unavailable sentinel the scheduler degrades on.
pub struct BundleForecastSource {
    price: Option<Forecast<PricePoint>>,
    weather: Option<Forecast<WeatherPoint>>,
}

impl BundleForecastSource {
    pub fn new(price: Option<Forecast<PricePoint>>, weather: Option<Forecast<WeatherPoint>>) -> Self {
        Self { price, weather }
    }
}

#[async_trait]
impl ForecastSource for BundleForecastSource {
    async fn price_forecast(&self, _hours_ahead: u32) -> DomainResult<Forecast<PricePoint>> {
        self.price
            .clone()
            .ok_or_else(|| DomainError::ForecastUnavailable("no price forecast in bundle".to_string()))
    }

    async fn weather_forecast(&self, _hours_ahead: u32) -> DomainResult<Forecast<WeatherPoint>> {
        self.weather.clone().ok_or_else(|| {
            DomainError::ForecastUnavailable("no weather forecast in bundle".to_string())
        })
    }
}
