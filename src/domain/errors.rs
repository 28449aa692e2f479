//! Domain errors for the curveshift tuning engine.
//!
//! A decision rejected by the safety validator is NOT an error; it is a
//! verdict, logged and carried on from. Errors here are the conditions that
//! interrupt a cycle step: unavailable collaborators, malformed advisor
//! output, persistence failures.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the curveshift system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unknown parameter: {0}")]
    ParameterUnknown(String),

    #[error("Parameter change not found: {0}")]
    ChangeNotFound(Uuid),

    #[error("Planned test not found: {0}")]
    TestNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Evaluation window still open; ready at {ready_at}")]
    EvaluationWindowOpen { ready_at: DateTime<Utc> },

    #[error("A test result already exists for change {0}")]
    ResultAlreadyRecorded(Uuid),

    #[error("Forecast unavailable: {0}")]
    ForecastUnavailable(String),

    #[error("External service '{service}' failed: {message}")]
    ExternalService { service: String, message: String },

    #[error("Advisor output violates the expected schema: {0}")]
    SchemaViolation(String),

    #[error("All {attempts} advisor providers failed")]
    AdvisorsExhausted { attempts: usize },

    #[error("Device rejected write to {parameter}: {message}")]
    DeviceRejected { parameter: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
