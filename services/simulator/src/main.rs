//! Scenario runner for the elastic-supply exchange
//!
//! Usage:
//!   elastic-sim --scenario services/simulator/scenarios/rebase_cycle.toml
//!   elastic-sim --config config/exchange.toml --scenario my_scenario.toml --json-logs
//!
//! The JSON report goes to stdout, logs to stderr.

mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use elastic_config::ExchangeSettings;

#[derive(Parser, Debug)]
#[command(name = "elastic-sim")]
#[command(about = "Replay liquidity, swap and rebase scenarios against an elastic-supply exchange")]
#[command(version)]
struct Args {
    /// Path to the scenario file
    #[arg(short, long)]
    scenario: PathBuf,

    /// Path to the exchange settings file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let settings = match &args.config {
        Some(path) => ExchangeSettings::load(path)?,
        None => {
            info!("No settings file given, using defaults");
            ExchangeSettings::default()
        }
    };

    let scenario = scenario::Scenario::from_file(&args.scenario)?;
    let report = scenario::run(&scenario, &settings).map_err(|e| {
        error!("Scenario failed: {:#}", e);
        e
    })?;

    info!(
        steps = report.steps.len(),
        events = report.events.len(),
        "Scenario complete"
    );
    let json = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
    println!("{}", json);
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if args.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}
