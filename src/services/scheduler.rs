//! Predictive scheduler.
//!
//! Decides once per cycle whether to shift the heating curve offset in
//! anticipation of forecast price and weather conditions. The thermal lag
//! of the building is the scheduling constant: a change made now lands on
//! comfort roughly `thermal_lag_hours` later, so the scheduler classifies
//! conditions at that horizon and acts only when the trigger falls inside
//! it.

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Decision, DeviceState, Forecast, ParameterId, PriceLevel, PricePoint, SchedulerConfig,
    TempTrend, WeatherPoint,
};
use crate::domain::ports::ForecastSource;

/// Short-horizon feedback signal from the most recent applied change.
///
/// Fast and low-confidence: it biases the confidence of the next proposal
/// and nothing else. Reverts remain the business of the 48 h A/B cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShortHorizonFeedback {
    /// COP change over the short window, percent.
    pub cop_change_pct: f64,
}

impl ShortHorizonFeedback {
    /// Confidence bias in [-0.10, +0.10], proportional to the short-window
    /// COP movement.
    pub fn confidence_bias(&self) -> f64 {
        (self.cop_change_pct / 100.0).clamp(-0.10, 0.10)
    }
}

/// One cell of the price/trend decision matrix.
#[derive(Debug, Clone, Copy)]
struct MatrixCell {
    /// Signed magnitude in scheduler steps.
    steps: f64,
    rationale: &'static str,
}

/// Forecast-driven proposer for the heating curve offset.
pub struct PredictiveScheduler {
    config: SchedulerConfig,
}

impl PredictiveScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Produce this cycle's decision.
    ///
    /// Degrades to hold whenever a forecast is missing, stale, or too
    /// short: inaction is cheaper than a blind action for both comfort and
    /// cost.
    pub async fn decide(
        &self,
        forecasts: &dyn ForecastSource,
        state: &DeviceState,
        feedback: ShortHorizonFeedback,
    ) -> DomainResult<Decision> {
        let lead_hours = self.config.lead_time().ceil() as u32;
        let horizon = lead_hours + 1;

        let price = match forecasts.price_forecast(horizon).await {
            Ok(forecast) => forecast,
            Err(DomainError::ForecastUnavailable(reason)) => {
                return Ok(self.hold(format!("price forecast unavailable: {reason}")));
            }
            Err(err) => return Err(err),
        };
        let weather = match forecasts.weather_forecast(horizon).await {
            Ok(forecast) => forecast,
            Err(DomainError::ForecastUnavailable(reason)) => {
                return Ok(self.hold(format!("weather forecast unavailable: {reason}")));
            }
            Err(err) => return Err(err),
        };

        if let Some(reason) = self.usability_problem(&price, &weather, lead_hours) {
            return Ok(self.hold(reason));
        }

        // Classify conditions at the hour our change would take effect.
        let Some(level) = price.level_at(lead_hours) else {
            return Ok(self.hold(format!("price forecast shorter than {lead_hours}h lead")));
        };
        let Some(trend) = weather.trend(lead_hours, self.config.trend_threshold_c) else {
            return Ok(self.hold("weather forecast too short to judge a trend".to_string()));
        };

        let cell = Self::matrix(level, trend);
        debug!(
            level = level.as_str(),
            trend = trend.as_str(),
            steps = cell.steps,
            "decision matrix consulted"
        );
        if cell.steps == 0.0 {
            return Ok(self.hold(format!(
                "{} price with {} outdoor trend: {}",
                level.as_str(),
                trend.as_str(),
                cell.rationale
            )));
        }

        // Act only when the trigger condition actually lands within the
        // lead window; earlier wastes the lead, later misses it.
        if !Self::condition_within_lead(&price, level, lead_hours) {
            return Ok(self.hold(format!(
                "{} price expected beyond the {lead_hours}h lead window",
                level.as_str()
            )));
        }

        let parameter = ParameterId::CurveOffset;
        let Some(current) = state.value_of(parameter) else {
            return Ok(self.hold("device state has no curve offset reading".to_string()));
        };
        let suggested = current + cell.steps * self.config.step_size;
        let confidence =
            (self.config.base_confidence + feedback.confidence_bias()).clamp(0.0, 1.0);

        let reasoning = format!(
            "{} price and {} outdoor trend within {lead_hours}h: {}",
            level.as_str(),
            trend.as_str(),
            cell.rationale
        );
        info!(
            current,
            suggested, confidence, %reasoning, "scheduler proposes adjustment"
        );

        Ok(Decision::Adjust {
            parameter,
            current_value: current,
            suggested_value: suggested,
            confidence,
            reasoning,
        })
    }

    /// The 3x3 price/trend matrix. Comfort takes precedence over cost when
    /// the environment is getting harsher, which is why expensive+falling
    /// only backs off mildly.
    fn matrix(level: PriceLevel, trend: TempTrend) -> MatrixCell {
        match (level, trend) {
            (PriceLevel::Cheap, TempTrend::Falling) => MatrixCell {
                steps: 2.0,
                rationale: "buffer comfort aggressively while power is cheap and cold is coming",
            },
            (PriceLevel::Cheap, TempTrend::Stable) => MatrixCell {
                steps: 1.0,
                rationale: "bank cheap heat into the thermal mass",
            },
            (PriceLevel::Cheap, TempTrend::Rising) => MatrixCell {
                steps: 1.0,
                rationale: "store a little cheap heat ahead of milder weather",
            },
            (PriceLevel::Normal, TempTrend::Falling) => MatrixCell {
                steps: 1.0,
                rationale: "pre-heat moderately before the temperature drop",
            },
            (PriceLevel::Normal, TempTrend::Stable) => MatrixCell {
                steps: 0.0,
                rationale: "no forecast pressure either way",
            },
            (PriceLevel::Normal, TempTrend::Rising) => MatrixCell {
                steps: -1.0,
                rationale: "coast on stored heat as outdoor temperature climbs",
            },
            (PriceLevel::Expensive, TempTrend::Falling) => MatrixCell {
                steps: -1.0,
                rationale: "reduce mildly; comfort takes precedence over cost in harshening weather",
            },
            (PriceLevel::Expensive, TempTrend::Stable) => MatrixCell {
                steps: -1.0,
                rationale: "trim demand through the price peak",
            },
            (PriceLevel::Expensive, TempTrend::Rising) => MatrixCell {
                steps: -2.0,
                rationale: "reduce aggressively; expensive power and milder weather ahead",
            },
        }
    }

    /// Staleness and coverage checks shared by both forecasts.
    fn usability_problem(
        &self,
        price: &Forecast<PricePoint>,
        weather: &Forecast<WeatherPoint>,
        lead_hours: u32,
    ) -> Option<String> {
        let now = Utc::now();
        let max_age = Duration::minutes((self.config.max_forecast_age_hours * 60.0) as i64);
        if price.is_stale(now, max_age) {
            return Some(format!(
                "price forecast issued {}h ago exceeds max age",
                (now - price.issued_at).num_hours()
            ));
        }
        if weather.is_stale(now, max_age) {
            return Some(format!(
                "weather forecast issued {}h ago exceeds max age",
                (now - weather.issued_at).num_hours()
            ));
        }
        if price.is_empty() || weather.is_empty() {
            return Some("empty forecast".to_string());
        }
        if price.points.iter().all(|p| p.hour_offset < lead_hours) {
            return Some(format!("price forecast does not reach the {lead_hours}h lead"));
        }
        None
    }

    /// Whether the level classified at the lead hour first occurs inside
    /// the lead window.
    fn condition_within_lead(
        price: &Forecast<PricePoint>,
        level: PriceLevel,
        lead_hours: u32,
    ) -> bool {
        price
            .first_occurrence(level)
            .is_some_and(|hour| hour <= lead_hours)
    }

    fn hold(&self, reasoning: String) -> Decision {
        debug!(%reasoning, "scheduler holds");
        Decision::Hold { reasoning }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedForecasts {
        price: DomainResult<Forecast<PricePoint>>,
        weather: DomainResult<Forecast<WeatherPoint>>,
    }

    #[async_trait]
    impl ForecastSource for FixedForecasts {
        async fn price_forecast(&self, _hours: u32) -> DomainResult<Forecast<PricePoint>> {
            match &self.price {
                Ok(f) => Ok(f.clone()),
                Err(DomainError::ForecastUnavailable(r)) => {
                    Err(DomainError::ForecastUnavailable(r.clone()))
                }
                Err(_) => unreachable!(),
            }
        }

        async fn weather_forecast(&self, _hours: u32) -> DomainResult<Forecast<WeatherPoint>> {
            match &self.weather {
                Ok(f) => Ok(f.clone()),
                Err(DomainError::ForecastUnavailable(r)) => {
                    Err(DomainError::ForecastUnavailable(r.clone()))
                }
                Err(_) => unreachable!(),
            }
        }
    }

    fn price_forecast(levels: &[PriceLevel]) -> Forecast<PricePoint> {
        Forecast::new(
            levels
                .iter()
                .enumerate()
                .map(|(i, &level)| PricePoint {
                    hour_offset: i as u32,
                    level,
                    price: 1.0,
                })
                .collect(),
            Utc::now(),
        )
    }

    fn weather_forecast(temps: &[f64]) -> Forecast<WeatherPoint> {
        Forecast::new(
            temps
                .iter()
                .enumerate()
                .map(|(i, &t)| WeatherPoint {
                    hour_offset: i as u32,
                    temperature: t,
                })
                .collect(),
            Utc::now(),
        )
    }

    fn state() -> DeviceState {
        let mut values = HashMap::new();
        values.insert(ParameterId::CurveOffset, 0.0);
        DeviceState {
            values,
            indoor_temp: 21.5,
            read_at: Utc::now(),
        }
    }

    fn scheduler() -> PredictiveScheduler {
        PredictiveScheduler::new(SchedulerConfig::default())
    }

    #[tokio::test]
    async fn test_cheap_falling_buffers_aggressively() {
        let source = FixedForecasts {
            price: Ok(price_forecast(&[PriceLevel::Cheap; 5])),
            weather: Ok(weather_forecast(&[2.0, 1.0, 0.0, -1.0, -2.0])),
        };
        let decision = scheduler()
            .decide(&source, &state(), ShortHorizonFeedback::default())
            .await
            .unwrap();
        match decision {
            Decision::Adjust {
                suggested_value, ..
            } => assert!((suggested_value - 2.0).abs() < 1e-9),
            Decision::Hold { reasoning } => panic!("expected adjust, held: {reasoning}"),
        }
    }

    #[tokio::test]
    async fn test_expensive_rising_reduces_aggressively() {
        let source = FixedForecasts {
            price: Ok(price_forecast(&[PriceLevel::Expensive; 5])),
            weather: Ok(weather_forecast(&[0.0, 1.0, 2.0, 3.0, 4.0])),
        };
        let decision = scheduler()
            .decide(&source, &state(), ShortHorizonFeedback::default())
            .await
            .unwrap();
        match decision {
            Decision::Adjust {
                suggested_value, ..
            } => assert!((suggested_value + 2.0).abs() < 1e-9),
            Decision::Hold { reasoning } => panic!("expected adjust, held: {reasoning}"),
        }
    }

    #[tokio::test]
    async fn test_expensive_falling_reduces_mildly() {
        let source = FixedForecasts {
            price: Ok(price_forecast(&[PriceLevel::Expensive; 5])),
            weather: Ok(weather_forecast(&[2.0, 1.0, 0.0, -1.0, -2.0])),
        };
        let decision = scheduler()
            .decide(&source, &state(), ShortHorizonFeedback::default())
            .await
            .unwrap();
        match decision {
            Decision::Adjust {
                suggested_value, ..
            } => assert!((suggested_value + 1.0).abs() < 1e-9),
            Decision::Hold { reasoning } => panic!("expected adjust, held: {reasoning}"),
        }
    }

    #[tokio::test]
    async fn test_normal_stable_holds() {
        let source = FixedForecasts {
            price: Ok(price_forecast(&[PriceLevel::Normal; 5])),
            weather: Ok(weather_forecast(&[2.0, 2.1, 2.0, 1.9, 2.0])),
        };
        let decision = scheduler()
            .decide(&source, &state(), ShortHorizonFeedback::default())
            .await
            .unwrap();
        assert!(decision.is_hold());
    }

    #[tokio::test]
    async fn test_unavailable_forecast_degrades_to_hold() {
        let source = FixedForecasts {
            price: Err(DomainError::ForecastUnavailable("upstream timeout".to_string())),
            weather: Ok(weather_forecast(&[2.0; 5])),
        };
        let decision = scheduler()
            .decide(&source, &state(), ShortHorizonFeedback::default())
            .await
            .unwrap();
        match decision {
            Decision::Hold { reasoning } => assert!(reasoning.contains("unavailable")),
            Decision::Adjust { .. } => panic!("must hold on missing forecast"),
        }
    }

    #[tokio::test]
    async fn test_stale_forecast_degrades_to_hold() {
        let mut price = price_forecast(&[PriceLevel::Cheap; 5]);
        price.issued_at = Utc::now() - Duration::hours(10);
        let source = FixedForecasts {
            price: Ok(price),
            weather: Ok(weather_forecast(&[2.0, 1.0, 0.0, -1.0, -2.0])),
        };
        let decision = scheduler()
            .decide(&source, &state(), ShortHorizonFeedback::default())
            .await
            .unwrap();
        match decision {
            Decision::Hold { reasoning } => assert!(reasoning.contains("max age")),
            Decision::Adjust { .. } => panic!("must hold on stale forecast"),
        }
    }

    #[tokio::test]
    async fn test_short_forecast_degrades_to_hold() {
        let source = FixedForecasts {
            price: Ok(price_forecast(&[PriceLevel::Cheap])),
            weather: Ok(weather_forecast(&[2.0, 1.0, 0.0, -1.0, -2.0])),
        };
        let decision = scheduler()
            .decide(&source, &state(), ShortHorizonFeedback::default())
            .await
            .unwrap();
        assert!(decision.is_hold());
    }

    #[tokio::test]
    async fn test_feedback_biases_confidence() {
        let source = FixedForecasts {
            price: Ok(price_forecast(&[PriceLevel::Cheap; 5])),
            weather: Ok(weather_forecast(&[2.0, 1.0, 0.0, -1.0, -2.0])),
        };
        let positive = ShortHorizonFeedback { cop_change_pct: 20.0 };
        let decision = scheduler()
            .decide(&source, &state(), positive)
            .await
            .unwrap();
        match decision {
            Decision::Adjust { confidence, .. } => {
                // Base 0.75 plus the clamped +0.10 bias.
                assert!((confidence - 0.85).abs() < 1e-9);
            }
            Decision::Hold { .. } => panic!("expected adjust"),
        }
    }

    #[test]
    fn test_confidence_bias_is_clamped() {
        let huge = ShortHorizonFeedback { cop_change_pct: 300.0 };
        assert!((huge.confidence_bias() - 0.10).abs() < 1e-9);
        let negative = ShortHorizonFeedback { cop_change_pct: -300.0 };
        assert!((negative.confidence_bias() + 0.10).abs() < 1e-9);
    }
}
