//! Infra Triage CLI
//!
//! A command-line tool for running ad-hoc anomaly detection, generating
//! synthetic metrics and viewing the results of the last agent run.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{detect, results, simulate};
use tracing_subscriber::EnvFilter;
use triage_lib::ingest::SimulationConfig;
use triage_lib::settings::DetectionStrategy;
use triage_lib::Severity;

/// Infra Triage CLI
#[derive(Parser)]
#[command(name = "triage")]
#[command(author, version, about = "CLI for Infra Triage anomaly detection", long_about = None)]
pub struct Cli {
    /// Output format (defaults to the config file value, then table)
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect anomalies in a metrics CSV and print incident reports
    Detect {
        /// Metrics CSV (timestamp,node,cpu,memory,latency_ms)
        #[arg(long, short)]
        input: PathBuf,

        /// Detection method (rolling_zscore, isolation_forest)
        #[arg(long)]
        method: Option<DetectionStrategy>,

        /// Z-score threshold
        #[arg(long)]
        threshold: Option<f64>,

        /// Rolling window size in records
        #[arg(long)]
        window: Option<usize>,

        /// Expected outlier fraction for the isolation forest
        #[arg(long)]
        contamination: Option<f64>,

        /// Maximum number of incident reports
        #[arg(long)]
        limit: Option<usize>,

        /// Export results to the data directory
        #[arg(long)]
        save: bool,

        /// Data directory override
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Generate a synthetic metrics CSV
    Simulate {
        /// Output CSV path
        #[arg(long, short)]
        output: PathBuf,

        /// Number of records
        #[arg(long, default_value_t = 900)]
        periods: usize,

        /// Seconds between records
        #[arg(long, default_value_t = 20)]
        interval_secs: i64,

        /// Number of injected CPU spikes
        #[arg(long, default_value_t = 12)]
        spikes: usize,

        /// Random seed
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },

    /// Show anomalies from the last run
    Anomalies {
        /// Data directory override
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Show incident reports from the last run
    Reports {
        /// Data directory override
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Filter by severity (critical, warning, info)
        #[arg(long)]
        severity: Option<Severity>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load()?;
    let format = config.format(cli.format)?;

    match cli.command {
        Commands::Detect {
            input,
            method,
            threshold,
            window,
            contamination,
            limit,
            save,
            dir,
        } => {
            let options = detect::DetectOptions {
                method,
                threshold,
                window,
                contamination,
                limit,
                save_to: save.then(|| config.data_dir(dir)),
            };
            detect::run_detect(&input, &options, format)?;
        }
        Commands::Simulate {
            output,
            periods,
            interval_secs,
            spikes,
            seed,
        } => {
            let sim = SimulationConfig {
                periods,
                interval_secs,
                spikes,
                seed,
                ..SimulationConfig::default()
            };
            simulate::run_simulate(&output, sim)?;
        }
        Commands::Anomalies { dir } => {
            results::show_anomalies(&config.data_dir(dir), format)?;
        }
        Commands::Reports { dir, severity } => {
            results::show_reports(&config.data_dir(dir), severity, format)?;
        }
    }

    Ok(())
}
