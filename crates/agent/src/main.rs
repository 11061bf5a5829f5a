//! Triage Agent - batch anomaly detection and incident summarization
//!
//! One invocation loads a metric snapshot, detects anomalies, summarizes them
//! into incident reports, delivers the reports and exports the results.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use triage_lib::{
    ingest::create_source, NotifierSet, ResultExporter, RunOutcome, StructuredLogger,
    TriagePipeline,
};

mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let config = config::AgentConfig::load()?;
    match &config.config_path {
        Some(path) => info!(path = %path.display(), "Loaded configuration file"),
        None => info!("No configuration file found, using defaults and environment"),
    }
    let settings = config.settings;

    let source = create_source(&settings.source)?;
    let logger = StructuredLogger::new(settings.runtime.node_name.clone());
    logger.log_run_started(
        AGENT_VERSION,
        &source.describe(),
        &settings.detection.method.to_string(),
    );

    let store = source
        .load()
        .with_context(|| format!("Failed to load metrics from {}", source.describe()))?;

    let pipeline = TriagePipeline::new(&settings);
    let RunOutcome { events, reports } = pipeline.run(&store);

    NotifierSet::from_settings(&settings.notifier, &logger)
        .dispatch(&reports)
        .context("Failed to deliver incident reports")?;

    let exporter = ResultExporter::new(&settings.runtime.output_dir);
    exporter
        .write_anomalies(&events)
        .context("Failed to export anomalies")?;
    exporter
        .write_reports(&reports)
        .context("Failed to export reports")?;
    exporter
        .write_metrics(&pipeline.metrics().gather_text()?)
        .context("Failed to export run metrics")?;
    logger.log_export(
        &settings.runtime.output_dir.display().to_string(),
        events.len(),
        reports.len(),
    );

    if reports.is_empty() {
        info!("No anomalies detected");
    }

    Ok(())
}
