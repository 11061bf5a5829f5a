//! Incident classification policy
//!
//! An ordered table of (predicate, incident class) pairs evaluated top to
//! bottom; the first match wins. The order is part of the contract: joint
//! cpu+memory and cpu+latency incidents take precedence over single-metric
//! ones, and anything else non-empty falls through to `Unclassified`.

use serde::{Deserialize, Serialize};

use super::signature::AnomalySignature;
use crate::models::EventMetric;

/// Incident severity assigned by the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Upper-case tag used in rendered reports
    pub fn tag(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Likely root cause of a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentClass {
    WorkloadSaturation,
    DownstreamBottleneck,
    NetworkCongestion,
    CpuSaturation,
    MemoryPressure,
    Unclassified,
}

impl IncidentClass {
    pub fn severity(&self) -> Severity {
        match self {
            IncidentClass::WorkloadSaturation | IncidentClass::DownstreamBottleneck => {
                Severity::Critical
            }
            IncidentClass::NetworkCongestion
            | IncidentClass::CpuSaturation
            | IncidentClass::MemoryPressure => Severity::Warning,
            IncidentClass::Unclassified => Severity::Info,
        }
    }

    pub fn cause(&self) -> &'static str {
        match self {
            IncidentClass::WorkloadSaturation => "memory leak or workload saturation",
            IncidentClass::DownstreamBottleneck => "database/downstream bottleneck",
            IncidentClass::NetworkCongestion => {
                "network congestion or downstream dependency issue"
            }
            IncidentClass::CpuSaturation => "CPU saturation",
            IncidentClass::MemoryPressure => "memory pressure",
            IncidentClass::Unclassified => "unclassified anomaly",
        }
    }

    pub fn suggested_action(&self) -> &'static str {
        match self {
            IncidentClass::WorkloadSaturation => {
                "restart affected workload and inspect memory-reclamation logs"
            }
            IncidentClass::DownstreamBottleneck => {
                "inspect query latency and downstream dependency health"
            }
            IncidentClass::NetworkCongestion => "check gateway and network connectivity",
            IncidentClass::CpuSaturation => "inspect process load and autoscaling policy",
            IncidentClass::MemoryPressure => "inspect allocation patterns / possible leak",
            IncidentClass::Unclassified => "manual investigation recommended",
        }
    }

    /// Fill the class template with the signature's node and values
    pub fn message(&self, signature: &AnomalySignature) -> String {
        let node = &signature.node_id;
        let value = |metric| signature.value(metric).unwrap_or_default();

        match self {
            IncidentClass::WorkloadSaturation => format!(
                "Node {} shows cpu {:.1} and memory {:.1} anomalous together. Likely cause: {}.",
                node,
                value(EventMetric::Cpu),
                value(EventMetric::Memory),
                self.cause()
            ),
            IncidentClass::DownstreamBottleneck => format!(
                "Node {} shows cpu {:.1} with latency {:.0}ms. Likely cause: {}.",
                node,
                value(EventMetric::Cpu),
                value(EventMetric::Latency),
                self.cause()
            ),
            IncidentClass::NetworkCongestion => format!(
                "Latency {:.0}ms on {} while cpu/memory normal. Likely cause: {}.",
                value(EventMetric::Latency),
                node,
                self.cause()
            ),
            IncidentClass::CpuSaturation => format!(
                "cpu {:.1} on {} outside its normal range. Likely cause: {}.",
                value(EventMetric::Cpu),
                node,
                self.cause()
            ),
            IncidentClass::MemoryPressure => format!(
                "memory {:.1} on {} outside its normal range. Likely cause: {}.",
                value(EventMetric::Memory),
                node,
                self.cause()
            ),
            IncidentClass::Unclassified => format!(
                "Anomaly on {} ({}). Likely cause: {}.",
                node,
                signature.describe(),
                self.cause()
            ),
        }
    }
}

type Predicate = fn(&AnomalySignature) -> bool;

fn cpu_and_memory(s: &AnomalySignature) -> bool {
    s.contains(EventMetric::Cpu) && s.contains(EventMetric::Memory)
}

fn cpu_and_latency(s: &AnomalySignature) -> bool {
    s.contains(EventMetric::Cpu) && s.contains(EventMetric::Latency)
}

fn latency_alone(s: &AnomalySignature) -> bool {
    s.is_only(EventMetric::Latency)
}

fn cpu_alone(s: &AnomalySignature) -> bool {
    s.is_only(EventMetric::Cpu)
}

fn memory_alone(s: &AnomalySignature) -> bool {
    s.is_only(EventMetric::Memory)
}

fn anything(s: &AnomalySignature) -> bool {
    !s.is_empty()
}

/// Classification rules in priority order
pub const POLICY: [(Predicate, IncidentClass); 6] = [
    (cpu_and_memory, IncidentClass::WorkloadSaturation),
    (cpu_and_latency, IncidentClass::DownstreamBottleneck),
    (latency_alone, IncidentClass::NetworkCongestion),
    (cpu_alone, IncidentClass::CpuSaturation),
    (memory_alone, IncidentClass::MemoryPressure),
    (anything, IncidentClass::Unclassified),
];

/// Classify a signature; `None` only for an empty signature
pub fn classify(signature: &AnomalySignature) -> Option<IncidentClass> {
    POLICY
        .iter()
        .find(|(matches, _)| matches(signature))
        .map(|(_, class)| *class)
}
