//! Core data models for infra triage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};

/// Infrastructure metric tracked per node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cpu,
    Memory,
    Latency,
}

impl Metric {
    /// All tracked metrics in canonical order
    pub const ALL: [Metric; 3] = [Metric::Cpu, Metric::Memory, Metric::Latency];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Latency => "latency",
        }
    }

    /// Position of the metric in a feature vector
    pub fn index(&self) -> usize {
        match self {
            Metric::Cpu => 0,
            Metric::Memory => 1,
            Metric::Latency => 2,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Metric::Cpu),
            "memory" | "mem" => Ok(Metric::Memory),
            "latency" | "latency_ms" => Ok(Metric::Latency),
            other => Err(format!("unknown metric '{}'", other)),
        }
    }
}

/// Metric an anomaly event refers to.
///
/// `Composite` is used by joint isolation-forest events that flag a whole row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventMetric {
    Cpu,
    Memory,
    Latency,
    Composite,
}

impl EventMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventMetric::Cpu => "cpu",
            EventMetric::Memory => "memory",
            EventMetric::Latency => "latency",
            EventMetric::Composite => "composite",
        }
    }
}

impl From<Metric> for EventMetric {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Cpu => EventMetric::Cpu,
            Metric::Memory => EventMetric::Memory,
            Metric::Latency => EventMetric::Latency,
        }
    }
}

impl std::fmt::Display for EventMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One timestamped observation of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub cpu: f64,
    pub memory: f64,
    /// Request latency in milliseconds
    pub latency: f64,
}

impl MetricRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        node_id: impl Into<String>,
        cpu: f64,
        memory: f64,
        latency: f64,
    ) -> Self {
        Self {
            timestamp,
            node_id: node_id.into(),
            cpu,
            memory,
            latency,
        }
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cpu => self.cpu,
            Metric::Memory => self.memory,
            Metric::Latency => self.latency,
        }
    }

    /// Feature vector in `Metric::ALL` order
    pub fn features(&self) -> [f64; 3] {
        [self.cpu, self.memory, self.latency]
    }

    /// Check that the record is usable for detection.
    ///
    /// `label` identifies the record in the error (e.g. a CSV line).
    pub fn validate(&self, label: &str) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(TriageError::malformed(label, "node", "node id is empty"));
        }

        for metric in Metric::ALL {
            let value = self.value(metric);
            if !value.is_finite() {
                return Err(TriageError::malformed(
                    label,
                    metric.as_str(),
                    format!("value {} is not finite", value),
                ));
            }
            if value < 0.0 {
                return Err(TriageError::malformed(
                    label,
                    metric.as_str(),
                    format!("value {} must not be negative", value),
                ));
            }
        }

        // cpu and memory are utilisation percentages
        for metric in [Metric::Cpu, Metric::Memory] {
            let value = self.value(metric);
            if value > 100.0 {
                return Err(TriageError::malformed(
                    label,
                    metric.as_str(),
                    format!("percentage {} exceeds 100", value),
                ));
            }
        }

        Ok(())
    }
}

/// Detection strategy that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionMethod {
    #[serde(rename = "zscore")]
    ZScore,
    #[serde(rename = "isolation_forest")]
    IsolationForest,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMethod::ZScore => write!(f, "zscore"),
            DetectionMethod::IsolationForest => write!(f, "isolation_forest"),
        }
    }
}

/// A single anomalous observation flagged by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub metric: EventMetric,
    pub observed_value: f64,
    /// Rolling mean (z-score) or model score (isolation forest)
    pub reference_value: f64,
    pub severity_score: f64,
    pub method: DetectionMethod,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(cpu: f64, memory: f64, latency: f64) -> MetricRecord {
        MetricRecord::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            "node-a",
            cpu,
            memory,
            latency,
        )
    }

    #[test]
    fn test_valid_record() {
        assert!(record(35.0, 40.0, 80.0).validate("line 1").is_ok());
    }

    #[test]
    fn test_negative_latency_rejected() {
        let err = record(35.0, 40.0, -5.0).validate("line 2").unwrap_err();
        match err {
            TriageError::MalformedRecord { field, .. } => assert_eq!(field, "latency"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_percentage_over_100_rejected() {
        assert!(record(135.0, 40.0, 80.0).validate("line 3").is_err());
        assert!(record(35.0, 101.0, 80.0).validate("line 3").is_err());
    }

    #[test]
    fn test_nan_rejected() {
        assert!(record(f64::NAN, 40.0, 80.0).validate("line 4").is_err());
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("latency_ms".parse::<Metric>().unwrap(), Metric::Latency);
        assert_eq!("CPU".parse::<Metric>().unwrap(), Metric::Cpu);
        assert!("disk".parse::<Metric>().is_err());
    }

    #[test]
    fn test_event_metric_from_metric() {
        assert_eq!(EventMetric::from(Metric::Memory), EventMetric::Memory);
        assert_eq!(EventMetric::Composite.to_string(), "composite");
    }
}
