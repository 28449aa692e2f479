//! Forecast source port - hourly price and weather outlooks.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Forecast, PricePoint, WeatherPoint};

/// Supplier of exogenous forecasts for the predictive scheduler.
///
/// A source that cannot produce a usable forecast returns
/// `DomainError::ForecastUnavailable`; the scheduler degrades to hold
/// rather than guessing. Staleness is judged by the caller from
/// `Forecast::issued_at`.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Electricity price outlook for the next `hours_ahead` hours.
    async fn price_forecast(&self, hours_ahead: u32) -> DomainResult<Forecast<PricePoint>>;

    /// Outdoor temperature outlook for the next `hours_ahead` hours.
    async fn weather_forecast(&self, hours_ahead: u32) -> DomainResult<Forecast<WeatherPoint>>;
}
