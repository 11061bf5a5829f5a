//! Observability for triage runs
//!
//! Provides:
//! - Prometheus metrics (records ingested, anomaly events, reports by severity, detection latency)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::AnomalyEvent;
use crate::summarizer::{IncidentReport, Severity};

/// Histogram buckets for detection latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RunMetricsInner> = OnceLock::new();

struct RunMetricsInner {
    records_ingested: IntCounter,
    anomaly_events: IntCounterVec,
    reports: IntCounterVec,
    detection_latency_seconds: Histogram,
}

impl RunMetricsInner {
    fn new() -> Self {
        Self {
            records_ingested: register_int_counter!(
                "triage_records_ingested_total",
                "Metric records handed to the detector"
            )
            .expect("Failed to register records_ingested"),

            anomaly_events: register_int_counter_vec!(
                "triage_anomaly_events_total",
                "Anomaly events emitted, by detection method and metric",
                &["method", "metric"]
            )
            .expect("Failed to register anomaly_events"),

            reports: register_int_counter_vec!(
                "triage_reports_total",
                "Incident reports produced, by severity",
                &["severity"]
            )
            .expect("Failed to register reports"),

            detection_latency_seconds: register_histogram!(
                "triage_detection_latency_seconds",
                "Time spent running anomaly detection over a store",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register detection_latency_seconds"),
        }
    }
}

/// Run metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics; clones share the same counters.
#[derive(Clone)]
pub struct RunMetrics {
    _private: (),
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RunMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RunMetricsInner {
        GLOBAL_METRICS.get_or_init(RunMetricsInner::new)
    }

    pub fn add_records_ingested(&self, count: usize) {
        self.inner().records_ingested.inc_by(count as u64);
    }

    pub fn record_events(&self, events: &[AnomalyEvent]) {
        for event in events {
            let method = event.method.to_string();
            self.inner()
                .anomaly_events
                .with_label_values(&[method.as_str(), event.metric.as_str()])
                .inc();
        }
    }

    pub fn record_reports(&self, reports: &[IncidentReport]) {
        for report in reports {
            self.inner()
                .reports
                .with_label_values(&[&report.severity.to_string()])
                .inc();
        }
    }

    pub fn observe_detection_latency(&self, duration_secs: f64) {
        self.inner().detection_latency_seconds.observe(duration_secs);
    }

    /// Total records ingested by this process
    pub fn records_ingested(&self) -> u64 {
        self.inner().records_ingested.get()
    }

    /// Reports produced by this process at a severity
    pub fn reports_at(&self, severity: Severity) -> u64 {
        self.inner()
            .reports
            .with_label_values(&[&severity.to_string()])
            .get()
    }

    /// Render the default registry in Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Structured logger for run events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_run_started(&self, version: &str, source: &str, method: &str) {
        info!(
            event = "run_started",
            node = %self.node_name,
            version = %version,
            source = %source,
            method = %method,
            "Triage run started"
        );
    }

    pub fn log_ingested(&self, records: usize, nodes: usize) {
        info!(
            event = "records_ingested",
            node = %self.node_name,
            records = records,
            nodes = nodes,
            "Metric records loaded"
        );
    }

    pub fn log_detection(&self, detector: &str, records: usize, events: usize, elapsed_secs: f64) {
        info!(
            event = "detection_completed",
            node = %self.node_name,
            detector = %detector,
            records = records,
            anomaly_events = events,
            elapsed_secs = elapsed_secs,
            "Anomaly detection completed"
        );
    }

    pub fn log_anomaly(&self, anomaly: &AnomalyEvent) {
        info!(
            event = "anomaly_detected",
            node = %self.node_name,
            target_node = %anomaly.node_id,
            metric = %anomaly.metric,
            method = %anomaly.method,
            observed_value = anomaly.observed_value,
            reference_value = anomaly.reference_value,
            severity_score = anomaly.severity_score,
            timestamp = %anomaly.timestamp,
            "Anomaly detected"
        );
    }

    /// Critical reports are logged at warn level
    pub fn log_report(&self, report: &IncidentReport) {
        match report.severity {
            Severity::Critical => {
                warn!(
                    event = "incident_report",
                    node = %self.node_name,
                    target_node = %report.node_id,
                    severity = %report.severity,
                    cause = %report.cause,
                    suggested_action = %report.suggested_action,
                    timestamp = %report.timestamp,
                    "{}",
                    report.message
                );
            }
            _ => {
                info!(
                    event = "incident_report",
                    node = %self.node_name,
                    target_node = %report.node_id,
                    severity = %report.severity,
                    cause = %report.cause,
                    suggested_action = %report.suggested_action,
                    timestamp = %report.timestamp,
                    "{}",
                    report.message
                );
            }
        }
    }

    pub fn log_export(&self, output_dir: &str, events: usize, reports: usize) {
        info!(
            event = "results_exported",
            node = %self.node_name,
            output_dir = %output_dir,
            anomaly_events = events,
            reports = reports,
            "Run results exported"
        );
    }

    pub fn log_run_finished(&self, events: usize, reports: usize) {
        info!(
            event = "run_finished",
            node = %self.node_name,
            anomaly_events = events,
            reports = reports,
            "Triage run finished"
        );
    }
}
