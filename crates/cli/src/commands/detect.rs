//! Ad-hoc detection over a CSV file

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use triage_lib::ingest::{CsvSource, MetricsSource};
use triage_lib::notify::{ConsoleNotifier, Notifier};
use triage_lib::settings::{Contamination, DetectionStrategy, TriageSettings};
use triage_lib::{AnomalyEvent, IncidentReport, ResultExporter, TriagePipeline};

use crate::output::{print_anomalies, print_json, print_success, OutputFormat};

/// Flag overrides for a detection run
#[derive(Debug, Clone, Default)]
pub struct DetectOptions {
    pub method: Option<DetectionStrategy>,
    pub threshold: Option<f64>,
    pub window: Option<usize>,
    pub contamination: Option<f64>,
    pub limit: Option<usize>,
    /// Export results here after the run
    pub save_to: Option<PathBuf>,
}

impl DetectOptions {
    /// Default settings with the flags applied
    pub fn settings(&self) -> Result<TriageSettings> {
        if self.window == Some(0) {
            bail!("--window must be at least 1");
        }
        if self.threshold.is_some_and(|t| !(t > 0.0)) {
            bail!("--threshold must be positive");
        }
        if self.contamination.is_some_and(|c| !(c > 0.0 && c <= 0.5)) {
            bail!("--contamination must be in (0, 0.5]");
        }

        let mut settings = TriageSettings::default();
        if let Some(method) = self.method {
            settings.detection.method = method;
        }
        if let Some(threshold) = self.threshold {
            settings.detection.zscore_threshold = threshold;
        }
        if let Some(window) = self.window {
            settings.detection.rolling_window = window;
        }
        if let Some(contamination) = self.contamination {
            settings.detection.contamination = Contamination::Fraction(contamination);
        }
        if let Some(limit) = self.limit {
            settings.runtime.limit_alerts = limit;
        }
        Ok(settings)
    }
}

#[derive(Serialize)]
struct DetectOutput<'a> {
    anomalies: &'a [AnomalyEvent],
    reports: &'a [IncidentReport],
}

/// Detect anomalies in a CSV file and print the incident reports
pub fn run_detect(input: &Path, options: &DetectOptions, format: OutputFormat) -> Result<()> {
    let settings = options.settings()?;
    let store = CsvSource::new(input)
        .load()
        .with_context(|| format!("Failed to load metrics from {}", input.display()))?;
    tracing::debug!(
        records = store.len(),
        nodes = store.node_count(),
        method = %settings.detection.method,
        "Loaded metrics for detection"
    );

    let outcome = TriagePipeline::new(&settings).run(&store);

    match format {
        OutputFormat::Json => print_json(&DetectOutput {
            anomalies: &outcome.events,
            reports: &outcome.reports,
        })?,
        OutputFormat::Table => {
            print_anomalies(&outcome.events, format)?;
            if !outcome.reports.is_empty() {
                println!();
                let console = ConsoleNotifier::stdout();
                for report in &outcome.reports {
                    console.notify(report)?;
                }
            }
        }
    }

    if let Some(dir) = &options.save_to {
        let exporter = ResultExporter::new(dir);
        exporter.write_anomalies(&outcome.events)?;
        exporter.write_reports(&outcome.reports)?;
        if format == OutputFormat::Table {
            print_success(&format!("Results saved to {}", dir.display()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let options = DetectOptions {
            method: Some(DetectionStrategy::IsolationForest),
            threshold: Some(2.5),
            window: Some(5),
            contamination: Some(0.1),
            limit: Some(3),
            save_to: None,
        };

        let settings = options.settings().unwrap();
        assert_eq!(settings.detection.method, DetectionStrategy::IsolationForest);
        assert!((settings.detection.zscore_threshold - 2.5).abs() < f64::EPSILON);
        assert_eq!(settings.detection.rolling_window, 5);
        assert_eq!(settings.detection.contamination, Contamination::Fraction(0.1));
        assert_eq!(settings.runtime.limit_alerts, 3);
    }

    #[test]
    fn test_no_flags_keep_defaults() {
        let settings = DetectOptions::default().settings().unwrap();
        assert_eq!(settings.detection.method, DetectionStrategy::RollingZscore);
        assert_eq!(settings.detection.rolling_window, 20);
        assert_eq!(settings.runtime.limit_alerts, 10);
    }

    #[test]
    fn test_out_of_range_flags_rejected() {
        let zero_window = DetectOptions {
            window: Some(0),
            ..DetectOptions::default()
        };
        assert!(zero_window.settings().is_err());

        let huge_contamination = DetectOptions {
            contamination: Some(0.9),
            ..DetectOptions::default()
        };
        assert!(huge_contamination.settings().is_err());
    }
}
