//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that adapters must implement:
//! - `MetricSource`: window aggregation of appliance telemetry
//! - `DeviceControl`: setpoint writes and fresh state reads
//! - `ForecastSource`: hourly price and weather outlooks
//! - `Advisor`: reasoning collaborators behind a strict schema gate
//! - Repositories for changes, results, planned tests, and the decision log
//!
//! These traits keep the decision logic independent of any specific
//! telemetry pipeline, device transport, or storage engine.

pub mod advisor;
pub mod change_repository;
pub mod decision_log_repository;
pub mod device_control;
pub mod forecast_source;
pub mod metric_source;
pub mod planned_test_repository;
pub mod result_repository;

pub use advisor::{Advisor, AdvisorContext, AdvisorProposal, ProposalAction};
pub use change_repository::ChangeRepository;
pub use decision_log_repository::DecisionLogRepository;
pub use device_control::DeviceControl;
pub use forecast_source::ForecastSource;
pub use metric_source::MetricSource;
pub use planned_test_repository::PlannedTestRepository;
pub use result_repository::ResultRepository;
