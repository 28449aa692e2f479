//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use curveshift::adapters::sqlite::{all_embedded_migrations, create_test_pool, Migrator};
use curveshift::adapters::telemetry::TelemetrySample;
use curveshift::domain::models::{Forecast, PriceLevel, PricePoint, WeatherPoint};
use curveshift::{DomainError, DomainResult, DeviceControl, DeviceState, ParameterId};

/// Create an in-memory SQLite database with migrations applied.
///
/// Each call creates a completely isolated database instance.
pub async fn setup_test_db() -> SqlitePool {
    let pool = create_test_pool().await.expect("failed to create test database");
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .expect("failed to run migrations");
    pool
}

pub async fn teardown_test_db(pool: SqlitePool) {
    pool.close().await;
}

/// Hourly telemetry from `start` for `hours` readings; COP switches from
/// `cop_before` to `cop_after` for samples after `pivot`.
pub fn hourly_samples(
    start: DateTime<Utc>,
    hours: i64,
    pivot: DateTime<Utc>,
    cop_before: f64,
    cop_after: f64,
) -> Vec<TelemetrySample> {
    (0..hours)
        .map(|i| {
            let at = start + Duration::hours(i);
            TelemetrySample {
                at,
                cop: if at <= pivot { cop_before } else { cop_after },
                delta_t: 6.0,
                indoor_temp: 21.0,
                outdoor_temp: 2.0,
                compressor_starts: 1,
                energy_cost: 2.0,
            }
        })
        .collect()
}

pub fn cheap_falling_price(hours: u32) -> Forecast<PricePoint> {
    Forecast::new(
        (0..hours)
            .map(|i| PricePoint {
                hour_offset: i,
                level: PriceLevel::Cheap,
                price: 0.4,
            })
            .collect(),
        Utc::now(),
    )
}

pub fn expensive_price(hours: u32) -> Forecast<PricePoint> {
    Forecast::new(
        (0..hours)
            .map(|i| PricePoint {
                hour_offset: i,
                level: PriceLevel::Expensive,
                price: 2.8,
            })
            .collect(),
        Utc::now(),
    )
}

pub fn falling_weather(hours: u32) -> Forecast<WeatherPoint> {
    Forecast::new(
        (0..hours)
            .map(|i| WeatherPoint {
                hour_offset: i,
                temperature: 2.0 - f64::from(i),
            })
            .collect(),
        Utc::now(),
    )
}

pub fn rising_weather(hours: u32) -> Forecast<WeatherPoint> {
    Forecast::new(
        (0..hours)
            .map(|i| WeatherPoint {
                hour_offset: i,
                temperature: f64::from(i),
            })
            .collect(),
        Utc::now(),
    )
}

/// Device whose writes always fail; reads succeed.
pub struct FailingDevice {
    pub state: DeviceState,
}

#[async_trait]
impl DeviceControl for FailingDevice {
    async fn read_state(&self) -> DomainResult<DeviceState> {
        Ok(self.state.clone())
    }

    async fn apply(&self, parameter: ParameterId, _value: f64) -> DomainResult<()> {
        Err(DomainError::DeviceRejected {
            parameter: parameter.as_str().to_string(),
            message: "register write refused".to_string(),
        })
    }
}
