//! Incident summarization
//!
//! Turns anomaly events into incident reports:
//! - Events are grouped into per-(node, timestamp) signatures
//! - Each signature is classified by the ordered policy table
//! - Reports are truncated to the configured alert limit
//!
//! The mapping is pure: no state survives a call and reports carry no
//! reference back to the events they came from.

mod policy;
mod report;
mod signature;

pub use policy::{classify, IncidentClass, Severity, POLICY};
pub use report::IncidentReport;
pub use signature::{group_events, AnomalySignature, FlaggedMetric};

use std::collections::HashMap;

use crate::models::AnomalyEvent;
use crate::settings::{RuntimeSettings, Truncation};

/// Default maximum number of reports per run
const DEFAULT_LIMIT_ALERTS: usize = 10;

/// Signatures per node above which reports get a recurrence note
const RECURRENCE_THRESHOLD: usize = 3;

const RECURRENCE_NOTE: &str =
    "Multiple anomalies detected on this node recently; consider cordoning or replacing the node.";

/// Rule-based mapping from anomaly events to incident reports
#[derive(Debug, Clone)]
pub struct IncidentSummarizer {
    /// Maximum number of reports returned
    pub limit_alerts: usize,
    /// Which end of the sequence survives truncation
    pub truncation: Truncation,
}

impl IncidentSummarizer {
    pub fn new(limit_alerts: usize) -> Self {
        Self {
            limit_alerts,
            truncation: Truncation::Earliest,
        }
    }

    pub fn with_truncation(mut self, truncation: Truncation) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(settings.limit_alerts).with_truncation(settings.truncation)
    }

    /// Summarize events into at most `limit_alerts` reports, in event order
    pub fn summarize(&self, events: &[AnomalyEvent]) -> Vec<IncidentReport> {
        let signatures = group_events(events);

        let mut per_node: HashMap<&str, usize> = HashMap::new();
        for signature in &signatures {
            *per_node.entry(signature.node_id.as_str()).or_default() += 1;
        }

        let reports = signatures.iter().filter_map(|signature| {
            let class = classify(signature)?;
            let report = IncidentReport::from_signature(signature, class);
            let repeated = per_node
                .get(signature.node_id.as_str())
                .is_some_and(|count| *count > RECURRENCE_THRESHOLD);
            Some(if repeated {
                report.with_recurrence_note(RECURRENCE_NOTE)
            } else {
                report
            })
        });

        match self.truncation {
            Truncation::Earliest => reports.take(self.limit_alerts).collect(),
            Truncation::Latest => {
                let all: Vec<IncidentReport> = reports.collect();
                let skip = all.len().saturating_sub(self.limit_alerts);
                all.into_iter().skip(skip).collect()
            }
        }
    }
}

impl Default for IncidentSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT_ALERTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectionMethod, EventMetric};
    use chrono::{Duration, TimeZone, Utc};

    fn event(node: &str, secs: i64, metric: EventMetric, value: f64) -> AnomalyEvent {
        AnomalyEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs),
            node_id: node.to_string(),
            metric,
            observed_value: value,
            reference_value: 50.0,
            severity_score: 3.5,
            method: DetectionMethod::ZScore,
        }
    }

    #[test]
    fn test_cpu_and_memory_on_node_b() {
        let events = vec![
            event("node-b", 0, EventMetric::Cpu, 92.5),
            event("node-b", 0, EventMetric::Memory, 87.1),
        ];

        let reports = IncidentSummarizer::default().summarize(&events);
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.node_id, "node-b");
        assert_eq!(report.severity, Severity::Critical);
        assert!(report.cause.contains("memory leak"));
        assert!(report.suggested_action.contains("restart"));
        assert!(report.message.contains("92.5"));
        assert!(report.message.contains("87.1"));
    }

    #[test]
    fn test_latency_alone_on_node_c() {
        let events = vec![event("node-c", 0, EventMetric::Latency, 210.0)];

        let reports = IncidentSummarizer::default().summarize(&events);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].severity, Severity::Warning);
        assert!(reports[0].cause.contains("network congestion"));
    }

    #[test]
    fn test_empty_events_yield_no_reports() {
        assert!(IncidentSummarizer::default().summarize(&[]).is_empty());
    }

    #[test]
    fn test_report_count_never_exceeds_limit() {
        let events: Vec<AnomalyEvent> = (0..25)
            .map(|i| event(&format!("node-{}", i), i, EventMetric::Cpu, 90.0))
            .collect();

        for limit in [0, 1, 5, 25, 100] {
            let reports = IncidentSummarizer::new(limit).summarize(&events);
            assert_eq!(reports.len(), limit.min(25));
        }
    }

    #[test]
    fn test_truncation_keeps_order() {
        let events: Vec<AnomalyEvent> = (0..5)
            .map(|i| event(&format!("node-{}", i), i * 10, EventMetric::Cpu, 90.0))
            .collect();

        let earliest = IncidentSummarizer::new(2).summarize(&events);
        let nodes: Vec<&str> = earliest.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(nodes, vec!["node-0", "node-1"]);

        let latest = IncidentSummarizer::new(2)
            .with_truncation(Truncation::Latest)
            .summarize(&events);
        let nodes: Vec<&str> = latest.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(nodes, vec!["node-3", "node-4"]);
    }

    #[test]
    fn test_recurrence_note_for_noisy_node() {
        let mut events: Vec<AnomalyEvent> = (0..4)
            .map(|i| event("node-a", i * 20, EventMetric::Cpu, 95.0))
            .collect();
        events.push(event("node-b", 5, EventMetric::Memory, 90.0));

        let reports = IncidentSummarizer::new(10).summarize(&events);
        assert_eq!(reports.len(), 5);
        for report in &reports {
            match report.node_id.as_str() {
                "node-a" => assert!(report.recurrence_note.is_some()),
                _ => assert!(report.recurrence_note.is_none()),
            }
        }
    }

    #[test]
    fn test_composite_events_are_info() {
        let events = vec![event("node-a", 0, EventMetric::Composite, 0.71)];
        let reports = IncidentSummarizer::default().summarize(&events);
        assert_eq!(reports[0].severity, Severity::Info);
        assert_eq!(reports[0].class, IncidentClass::Unclassified);
        assert!(reports[0].suggested_action.contains("manual investigation"));
    }

    #[test]
    fn test_reports_follow_event_order() {
        let events = vec![
            event("node-c", 40, EventMetric::Latency, 300.0),
            event("node-a", 10, EventMetric::Cpu, 95.0),
            event("node-c", 40, EventMetric::Cpu, 91.0),
        ];

        let reports = IncidentSummarizer::default().summarize(&events);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].node_id, "node-c");
        assert_eq!(reports[0].class, IncidentClass::DownstreamBottleneck);
        assert_eq!(reports[1].node_id, "node-a");
    }
}
