//! Price and weather forecast types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Price classification for one forecast hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceLevel {
    Cheap,
    Normal,
    Expensive,
}

impl PriceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cheap => "cheap",
            Self::Normal => "normal",
            Self::Expensive => "expensive",
        }
    }
}

/// Outdoor temperature tendency over the scheduling lead window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempTrend {
    Falling,
    Stable,
    Rising,
}

impl TempTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Falling => "falling",
            Self::Stable => "stable",
            Self::Rising => "rising",
        }
    }
}

/// One hour of the price forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Whole hours from now; 0 is the current hour.
    pub hour_offset: u32,
    pub level: PriceLevel,
    /// Spot price in the deployment's currency per kWh.
    pub price: f64,
}

/// One hour of the weather forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherPoint {
    /// Whole hours from now; 0 is the current hour.
    pub hour_offset: u32,
    /// Forecast outdoor temperature, degrees Celsius.
    pub temperature: f64,
}

/// An ordered hourly forecast with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast<T> {
    /// Points ordered by ascending `hour_offset`.
    pub points: Vec<T>,
    /// When the upstream source issued the forecast.
    pub issued_at: DateTime<Utc>,
}

impl<T> Forecast<T> {
    pub fn new(points: Vec<T>, issued_at: DateTime<Utc>) -> Self {
        Self { points, issued_at }
    }

    /// Whether the forecast is older than `max_age` as of `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.issued_at > max_age
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Forecast<WeatherPoint> {
    /// Temperature trend across the first `window_hours` of the forecast,
    /// judged against `threshold` degrees of total movement.
    pub fn trend(&self, window_hours: u32, threshold: f64) -> Option<TempTrend> {
        let first = self.points.first()?;
        let last = self
            .points
            .iter()
            .take_while(|p| p.hour_offset <= window_hours)
            .last()?;
        if last.hour_offset == first.hour_offset {
            return None;
        }
        let delta = last.temperature - first.temperature;
        Some(if delta <= -threshold {
            TempTrend::Falling
        } else if delta >= threshold {
            TempTrend::Rising
        } else {
            TempTrend::Stable
        })
    }

    /// Mean forecast temperature over the first `window_hours`.
    pub fn mean_over(&self, window_hours: u32) -> Option<f64> {
        let temps: Vec<f64> = self
            .points
            .iter()
            .take_while(|p| p.hour_offset <= window_hours)
            .map(|p| p.temperature)
            .collect();
        if temps.is_empty() {
            return None;
        }
        Some(temps.iter().sum::<f64>() / temps.len() as f64)
    }
}

impl Forecast<PricePoint> {
    /// Price level at the given hour offset, if forecast that far ahead.
    pub fn level_at(&self, hour_offset: u32) -> Option<PriceLevel> {
        self.points
            .iter()
            .find(|p| p.hour_offset == hour_offset)
            .map(|p| p.level)
    }

    /// Earliest hour at which the given level occurs.
    pub fn first_occurrence(&self, level: PriceLevel) -> Option<u32> {
        self.points
            .iter()
            .find(|p| p.level == level)
            .map(|p| p.hour_offset)
    }
}
