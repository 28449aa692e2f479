//! Curveshift CLI entry point.

use clap::Parser;

use curveshift::cli::{Cli, Commands};
use curveshift::infrastructure::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match curveshift::cli::load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err:#}");
            std::process::exit(1);
        }
    };

    let _guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("logging setup failed: {err:#}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Init => curveshift::cli::execute_init(),
        Commands::Cycle { ref bundle } => curveshift::cli::execute_cycle(config, bundle).await,
        Commands::Backlog => curveshift::cli::execute_backlog(config).await,
        Commands::History { limit } => curveshift::cli::execute_history(config, limit).await,
        Commands::Results { hours } => curveshift::cli::execute_results(config, hours).await,
        Commands::Cancel { test } => curveshift::cli::execute_cancel(config, test).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
