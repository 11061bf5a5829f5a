//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use triage_lib::{AnomalyEvent, EventMetric, Severity};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Row for anomaly tables
#[derive(Tabled)]
pub struct AnomalyRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Observed")]
    observed: String,
    #[tabled(rename = "Reference")]
    reference: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Method")]
    method: String,
}

impl From<&AnomalyEvent> for AnomalyRow {
    fn from(event: &AnomalyEvent) -> Self {
        Self {
            timestamp: format_timestamp(&event.timestamp),
            node: event.node_id.clone(),
            metric: event.metric.to_string(),
            observed: format_value(event.metric, event.observed_value),
            reference: format!("{:.2}", event.reference_value),
            score: format!("{:.2}", event.severity_score),
            method: event.method.to_string(),
        }
    }
}

/// Print anomaly events as a table or JSON
pub fn print_anomalies(events: &[AnomalyEvent], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&events)?,
        OutputFormat::Table => {
            if events.is_empty() {
                print_info("No anomalies detected");
                return Ok(());
            }
            let rows: Vec<AnomalyRow> = events.iter().map(AnomalyRow::from).collect();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
            println!("\nTotal: {} anomaly events", events.len());
        }
    }
    Ok(())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Timestamp in table form
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Observed value with its unit
pub fn format_value(metric: EventMetric, value: f64) -> String {
    match metric {
        EventMetric::Cpu | EventMetric::Memory => format!("{:.1}%", value),
        EventMetric::Latency => format!("{:.0}ms", value),
        EventMetric::Composite => format!("{:.3}", value),
    }
}

/// Color severity based on value
pub fn color_severity(severity: Severity) -> String {
    let tag = severity.tag();
    match severity {
        Severity::Critical => tag.red().bold().to_string(),
        Severity::Warning => tag.yellow().to_string(),
        Severity::Info => tag.blue().to_string(),
    }
}
