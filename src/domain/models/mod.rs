pub mod ab_test;
pub mod change;
pub mod config;
pub mod decision;
pub mod forecast;
pub mod metrics;
pub mod parameter;

pub use ab_test::{AbTestResult, ComponentScores, EvaluationOutcome, Recommendation};
pub use change::{ChangeOrigin, ParameterChange};
pub use config::{
    AdvisorsConfig, AnthropicConfig, Config, DatabaseConfig, DeviceConfig, EvaluationConfig,
    EvaluationWeights, LoggingConfig, ParameterConfig, PrioritizerConfig, PriorityWeights,
    SafetyConfig, SchedulerConfig,
};
pub use decision::{Decision, DecisionLogEntry};
pub use forecast::{Forecast, PriceLevel, PricePoint, TempTrend, WeatherPoint};
pub use metrics::MetricSnapshot;
pub use parameter::{DeviceState, ParameterDefinition, ParameterId, ParameterSet};
pub use planned_test::{PlannedTest, TestStatus};
