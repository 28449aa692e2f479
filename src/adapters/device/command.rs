//! Device control through external commands.
//!
//! Many heat pump installations expose their registers through a vendor
//! CLI or a small gateway script. This adapter shells out to configured
//! commands: one that prints the current state as JSON, one that applies a
//! single write and exits non-zero on failure.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{DeviceState, ParameterId};
use crate::domain::ports::DeviceControl;

pub struct CommandDeviceControl {
    read_command: String,
    apply_command: String,
}

impl CommandDeviceControl {
    pub fn new(read_command: impl Into<String>, apply_command: impl Into<String>) -> Self {
        Self {
            read_command: read_command.into(),
            apply_command: apply_command.into(),
        }
    }

    /// Split a configured command line into program and leading arguments.
    fn command(line: &str) -> Command {
        let mut parts = line.split_whitespace();
        let mut cmd = Command::new(parts.next().unwrap_or(line));
        cmd.args(parts);
        cmd
    }
}

#[async_trait]
impl DeviceControl for CommandDeviceControl {
    async fn read_state(&self) -> DomainResult<DeviceState> {
        debug!(command = %self.read_command, "reading device state");
        let output = Self::command(&self.read_command)
            .output()
            .await
            .map_err(|e| DomainError::ExternalService {
                service: "device".to_string(),
                message: format!("failed to spawn read command: {e}"),
            })?;

        if !output.status.success() {
            return Err(DomainError::ExternalService {
                service: "device".to_string(),
                message: format!(
                    "read command exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| DomainError::ExternalService {
            service: "device".to_string(),
            message: format!("read command printed invalid state JSON: {e}"),
        })
    }

    async fn apply(&self, parameter: ParameterId, value: f64) -> DomainResult<()> {
        info!(%parameter, value, command = %self.apply_command, "writing to device");
        let output = Self::command(&self.apply_command)
            .arg(parameter.as_str())
            .arg(value.to_string())
            .output()
            .await
            .map_err(|e| DomainError::DeviceRejected {
                parameter: parameter.as_str().to_string(),
                message: format!("failed to spawn apply command: {e}"),
            })?;

        if !output.status.success() {
            return Err(DomainError::DeviceRejected {
                parameter: parameter.as_str().to_string(),
                message: format!(
                    "apply command exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}
