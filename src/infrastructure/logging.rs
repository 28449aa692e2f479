//! Logging setup built on tracing.

use anyhow::{anyhow, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::domain::models::LoggingConfig;

/// Initialize the global subscriber from configuration.
///
/// Returns a guard that must be held for the process lifetime when file
/// output is enabled; dropping it stops the background writer.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut guard = None;

    if let Some(log_dir) = &config.log_dir {
        let file_appender = rolling::daily(log_dir, "curveshift.log");
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);

        // File output stays JSON for downstream tooling regardless of the
        // stderr format.
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .boxed(),
        );
    }

    layers.push(stderr_layer(&config.format)?);

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();
    Ok(guard)
}

fn stderr_layer(format: &str) -> Result<Box<dyn Layer<Registry> + Send + Sync>> {
    match format {
        "json" => Ok(tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()),
        "pretty" => Ok(tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()),
        other => Err(anyhow!("unknown log format '{other}'")),
    }
}
