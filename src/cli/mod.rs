//! Command-line harness.
//!
//! The engine itself is triggered and fed by the surrounding system; this
//! binary is that system's smallest useful form. `cycle` runs one
//! invocation from a telemetry bundle, the remaining commands inspect the
//! persisted decision history, backlog, and experiment results.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table};

use crate::adapters::advisors::build_chain;
use crate::adapters::device::{CommandDeviceControl, DryRunDeviceControl};
use crate::adapters::sqlite::{
    all_embedded_migrations, create_pool, Migrator, PoolConfig, SqliteChangeRepository,
    SqliteDecisionLogRepository, SqlitePlannedTestRepository, SqliteResultRepository,
};
use crate::adapters::telemetry::{BundleForecastSource, BundleMetricSource, TelemetryBundle};
use crate::domain::models::{Config, Decision, TestStatus};
use crate::domain::ports::{
    DecisionLogRepository, DeviceControl, PlannedTestRepository, ResultRepository,
};
use crate::infrastructure::ConfigLoader;
use crate::services::TuningEngine;

/// Closed-loop tuning for a residential heat pump.
#[derive(Debug, Parser)]
#[command(name = "curveshift", version, about)]
pub struct Cli {
    /// Path to a configuration file; defaults to .curveshift/config.yaml
    /// merged with environment overrides.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a starter configuration file.
    Init,
    /// Run one full invocation cycle from a telemetry bundle.
    Cycle {
        /// JSON file with telemetry samples, forecasts, and optionally a
        /// device state.
        #[arg(long)]
        bundle: PathBuf,
    },
    /// Show the experiment backlog in execution order.
    Backlog,
    /// Show recent decision log entries.
    History {
        /// Number of entries to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show evaluated experiment results.
    Results {
        /// Look back this many hours.
        #[arg(long, default_value_t = 168)]
        hours: u32,
    },
    /// Cancel a planned test between invocations.
    Cancel {
        /// Identifier of the test to withdraw.
        #[arg(long)]
        test: uuid::Uuid,
    },
}

pub fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

const STARTER_CONFIG: &str = r"# curveshift configuration. Every value shown is the default; delete
# anything you do not want to override. Environment variables with the
# CURVESHIFT_ prefix take precedence, e.g. CURVESHIFT_SAFETY__MIN_CONFIDENCE.
safety:
  comfort_floor_c: 20.5
  min_confidence: 0.7
scheduler:
  thermal_lag_hours: 3.0
  max_forecast_age_hours: 6.0
evaluation:
  window_hours: 48
  settle_offset_hours: 1
  min_samples: 12
  weather_divergence_c: 3.0
advisors:
  providers: [anthropic, heuristic]
database:
  path: .curveshift/curveshift.db
logging:
  level: info
  format: pretty
";

pub fn execute_init() -> Result<()> {
    std::fs::create_dir_all(".curveshift").context("creating .curveshift directory")?;
    let path = PathBuf::from(".curveshift/config.yaml");
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    std::fs::write(&path, STARTER_CONFIG).context("writing starter config")?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn open_database(config: &Config) -> Result<sqlx::SqlitePool> {
    let url = format!("sqlite://{}", config.database.path);
    let pool = create_pool(
        &url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..Default::default()
        }),
    )
    .await
    .context("opening database")?;
    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("running migrations")?;
    Ok(pool)
}

pub async fn execute_cycle(config: Config, bundle_path: &PathBuf) -> Result<()> {
    let bundle_json =
        std::fs::read_to_string(bundle_path).context("reading telemetry bundle")?;
    let bundle = TelemetryBundle::from_json(&bundle_json).context("parsing telemetry bundle")?;

    let pool = open_database(&config).await?;

    let metrics = Arc::new(BundleMetricSource::new(bundle.samples));
    let forecasts = Arc::new(BundleForecastSource::new(
        bundle.price_forecast,
        bundle.weather_forecast,
    ));
    let device: Arc<dyn DeviceControl> = match (
        &config.device.read_command,
        &config.device.apply_command,
    ) {
        (Some(read), Some(apply)) => Arc::new(CommandDeviceControl::new(read, apply)),
        _ => match bundle.device_state {
            Some(state) => Arc::new(DryRunDeviceControl::new(state)),
            None => Arc::new(DryRunDeviceControl::from_parameters(&config.parameter_set())),
        },
    };
    let advisors = build_chain(&config);

    let engine = TuningEngine::new(
        config,
        metrics,
        device,
        forecasts,
        advisors,
        Arc::new(SqliteChangeRepository::new(pool.clone())),
        Arc::new(SqliteResultRepository::new(pool.clone())),
        Arc::new(SqlitePlannedTestRepository::new(pool.clone())),
        Arc::new(SqliteDecisionLogRepository::new(pool.clone())),
    );

    let report = engine.run_cycle().await?;

    for outcome in &report.evaluated {
        match outcome.result() {
            Some(result) => println!(
                "evaluated: score {:.0} -> {} ({})",
                result.total_score,
                result.recommendation.as_str(),
                result.summary
            ),
            None => println!("evaluated: inconclusive"),
        }
    }
    match &report.scheduler_decision {
        Some(Decision::Adjust {
            parameter,
            suggested_value,
            ..
        }) => {
            let status = if report.scheduler_applied {
                "applied"
            } else {
                "not applied"
            };
            println!("scheduler: {parameter} -> {suggested_value:.2} ({status})");
        }
        Some(Decision::Hold { reasoning }) => println!("scheduler: hold ({reasoning})"),
        None => {}
    }
    if let Some(test_id) = report.promoted_test {
        println!("promoted test {test_id}");
    }
    println!("backlog: {} candidate(s)", report.backlog.len());
    Ok(())
}

pub async fn execute_backlog(config: Config) -> Result<()> {
    let pool = open_database(&config).await?;
    let repo = SqlitePlannedTestRepository::new(pool);
    let backlog = repo.list_backlog().await?;
    let active = repo.list_by_status(TestStatus::Active).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "#", "parameter", "current", "proposed", "priority", "confidence", "status",
        "hypothesis",
    ]);
    for test in active.iter().chain(backlog.iter()) {
        table.add_row(vec![
            Cell::new(test.execution_order),
            Cell::new(test.parameter),
            Cell::new(format!("{:.2}", test.current_value)),
            Cell::new(format!("{:.2}", test.proposed_value)),
            Cell::new(format!("{:.3}", test.priority_score)),
            Cell::new(format!("{:.2}", test.confidence)),
            Cell::new(test.status.as_str()),
            Cell::new(&test.hypothesis),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn execute_history(config: Config, limit: usize) -> Result<()> {
    let pool = open_database(&config).await?;
    let repo = SqliteDecisionLogRepository::new(pool);
    let entries = repo.list_recent(limit).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "decided", "action", "parameter", "suggested", "confidence", "applied", "reason",
    ]);
    for entry in entries {
        let reason = entry
            .rejection_reason
            .unwrap_or_else(|| entry.reasoning.clone());
        table.add_row(vec![
            Cell::new(entry.decided_at.format("%Y-%m-%d %H:%M")),
            Cell::new(&entry.action),
            Cell::new(entry.parameter.map_or("-".to_string(), |p| p.to_string())),
            Cell::new(
                entry
                    .suggested_value
                    .map_or("-".to_string(), |v| format!("{v:.2}")),
            ),
            Cell::new(format!("{:.2}", entry.confidence)),
            Cell::new(if entry.applied { "yes" } else { "no" }),
            Cell::new(reason),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn execute_cancel(config: Config, test_id: uuid::Uuid) -> Result<()> {
    let pool = open_database(&config).await?;
    let repo = SqlitePlannedTestRepository::new(pool);
    let mut test = repo
        .get(test_id)
        .await?
        .with_context(|| format!("no planned test {test_id}"))?;
    test.transition_to(TestStatus::Cancelled)
        .map_err(|reason| anyhow::anyhow!(reason))?;
    repo.update(&test).await?;
    println!("cancelled {} ({})", test.id, test.hypothesis);
    Ok(())
}

pub async fn execute_results(config: Config, hours: u32) -> Result<()> {
    let pool = open_database(&config).await?;
    let repo = SqliteResultRepository::new(pool);
    let results = repo.list_since(Utc::now() - Duration::hours(i64::from(hours))).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "evaluated", "score", "recommendation", "weather", "summary",
    ]);
    for result in results {
        table.add_row(vec![
            Cell::new(result.evaluated_at.format("%Y-%m-%d %H:%M")),
            Cell::new(format!("{:.0}", result.total_score)),
            Cell::new(result.recommendation.as_str()),
            Cell::new(if result.weather_divergent {
                "divergent"
            } else {
                "comparable"
            }),
            Cell::new(&result.summary),
        ]);
    }
    println!("{table}");
    Ok(())
}
