//! Infrastructure layer module
//!
//! Process-level concerns that sit outside the domain: configuration
//! loading and validation, and logging setup.

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigLoader};
