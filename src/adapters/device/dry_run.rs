//! In-memory device for rehearsal runs and tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use crate::domain::errors::DomainResult;
use crate::domain::models::{DeviceState, ParameterId, ParameterSet};
use crate::domain::ports::DeviceControl;

/// Accepts every write, mutating only its own in-memory state. Lets a full
/// cycle run end to end without touching an appliance.
pub struct DryRunDeviceControl {
    state: Arc<RwLock<DeviceState>>,
}

impl DryRunDeviceControl {
    pub fn new(initial: DeviceState) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
        }
    }

    /// Plausible defaults: every parameter at the midpoint of its bounds,
    /// indoor at 21.5C.
    pub fn from_parameters(parameters: &ParameterSet) -> Self {
        let values = parameters
            .iter()
            .map(|def| (def.id, (def.min + def.max) / 2.0))
            .collect();
        Self::new(DeviceState {
            values,
            indoor_temp: 21.5,
            read_at: Utc::now(),
        })
    }

    pub async fn current(&self) -> DeviceState {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl DeviceControl for DryRunDeviceControl {
    async fn read_state(&self) -> DomainResult<DeviceState> {
        let mut state = self.state.read().await.clone();
        state.read_at = Utc::now();
        Ok(state)
    }

    async fn apply(&self, parameter: ParameterId, value: f64) -> DomainResult<()> {
        let mut state = self.state.write().await;
        info!(%parameter, value, "dry-run write accepted");
        state.values.insert(parameter, value);
        Ok(())
    }
}
