//! Adapters for external systems.

pub mod advisors;
pub mod device;
pub mod sqlite;
pub mod telemetry;
