//! Views over the last exported run

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::Tabled;
use triage_lib::{IncidentReport, ResultExporter, Severity};

use crate::output::{
    color_severity, format_timestamp, print_anomalies, print_json, print_warning, OutputFormat,
};

/// Row for reports table
#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Cause")]
    cause: String,
    #[tabled(rename = "Suggested Action")]
    action: String,
}

/// Show the anomaly events of the last run
pub fn show_anomalies(dir: &Path, format: OutputFormat) -> Result<()> {
    let events = ResultExporter::new(dir)
        .read_anomalies()
        .with_context(|| format!("Failed to read anomalies from {}", dir.display()))?;

    if format == OutputFormat::Table {
        println!("{}", "Last Run Anomalies".bold());
        println!("{}", "=".repeat(60));
        println!("Results: {}", dir.display().to_string().cyan());
        println!();
    }
    print_anomalies(&events, format)
}

/// Reports matching an optional severity filter
pub fn filter_reports(
    reports: Vec<IncidentReport>,
    severity: Option<Severity>,
) -> Vec<IncidentReport> {
    reports
        .into_iter()
        .filter(|r| severity.map(|s| r.severity == s).unwrap_or(true))
        .collect()
}

/// Show the incident reports of the last run
pub fn show_reports(dir: &Path, severity: Option<Severity>, format: OutputFormat) -> Result<()> {
    let reports = ResultExporter::new(dir)
        .read_reports()
        .with_context(|| format!("Failed to read reports from {}", dir.display()))?;
    let filtered = filter_reports(reports, severity);

    match format {
        OutputFormat::Json => print_json(&filtered)?,
        OutputFormat::Table => {
            if filtered.is_empty() {
                print_warning("No incident reports found");
                return Ok(());
            }

            let rows: Vec<ReportRow> = filtered
                .iter()
                .map(|r| ReportRow {
                    timestamp: format_timestamp(&r.timestamp),
                    node: r.node_id.clone(),
                    severity: color_severity(r.severity),
                    cause: r.cause.clone(),
                    action: r.suggested_action.clone(),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            for report in &filtered {
                if let Some(note) = &report.recurrence_note {
                    println!("{} {}", report.node_id.bold(), note);
                }
            }
            println!("\nTotal: {} reports", filtered.len());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use triage_lib::summarizer::{AnomalySignature, IncidentClass};
    use triage_lib::EventMetric;

    fn report(node: &str, metric: EventMetric, class: IncidentClass) -> IncidentReport {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let signature = AnomalySignature::new(node, ts).with(metric, 95.0);
        IncidentReport::from_signature(&signature, class)
    }

    #[test]
    fn test_filter_by_severity() {
        let reports = vec![
            report("node-a", EventMetric::Cpu, IncidentClass::CpuSaturation),
            report("node-b", EventMetric::Composite, IncidentClass::Unclassified),
            report("node-c", EventMetric::Latency, IncidentClass::NetworkCongestion),
        ];

        let warnings = filter_reports(reports.clone(), Some(Severity::Warning));
        let nodes: Vec<&str> = warnings.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(nodes, vec!["node-a", "node-c"]);

        assert_eq!(filter_reports(reports, None).len(), 3);
    }
}
