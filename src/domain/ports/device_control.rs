//! Device control port - setpoint writes and fresh state reads.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{DeviceState, ParameterId};

/// Write access to the controlled appliance.
///
/// The device is a single shared mutable resource with exactly one logical
/// writer; the engine assumes it is that writer for the duration of one
/// invocation. A change is only recorded after `apply` returns `Ok`.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Read the current parameter values and indoor temperature. Called at
    /// the start of every cycle; results must never be cached across
    /// invocations.
    async fn read_state(&self) -> DomainResult<DeviceState>;

    /// Apply a new value to one parameter. Must not return `Ok` unless the
    /// write was confirmed by the device.
    async fn apply(&self, parameter: ParameterId, value: f64) -> DomainResult<()>;
}
