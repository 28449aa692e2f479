//! Curveshift - Closed-Loop Heat Pump Tuning Engine
//!
//! Curveshift proposes, validates, applies, and scientifically evaluates
//! changes to a small set of heat pump control parameters, improving an
//! efficiency metric while never violating a comfort floor.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): data model, error taxonomy, and the port
//!   traits external collaborators implement
//! - **Service Layer** (`services`): the safety validator, A/B evaluator,
//!   predictive scheduler, test prioritizer, and the cycle orchestrator
//! - **Adapters** (`adapters`): SQLite persistence, advisor providers,
//!   device control, telemetry aggregation
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line harness
//!
//! # Example
//!
//! ```ignore
//! use curveshift::services::TuningEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Wire adapters, build the engine, run one cycle.
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    AbTestResult, ChangeOrigin, Config, Decision, DecisionLogEntry, DeviceState,
    EvaluationOutcome, MetricSnapshot, ParameterChange, ParameterDefinition, ParameterId,
    ParameterSet, PlannedTest, Recommendation, TestStatus,
};
pub use domain::ports::{
    Advisor, AdvisorContext, AdvisorProposal, ChangeRepository, DecisionLogRepository,
    DeviceControl, ForecastSource, MetricSource, PlannedTestRepository, ProposalAction,
    ResultRepository,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::{ConfigError, ConfigLoader};
pub use services::{
    AbEvaluator, AdvisorChain, CycleReport, PredictiveScheduler, SafetyValidator,
    TestPrioritizer, TuningEngine, Verdict,
};
