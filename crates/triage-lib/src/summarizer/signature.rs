//! Per-(node, timestamp) anomaly signatures
//!
//! Detectors emit events of different shapes (one per metric, or one joint
//! event per row). Grouping them by node and timestamp gives the summarizer a
//! single view: which metrics are flagged, with what value and how strongly.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AnomalyEvent, EventMetric};

/// One flagged metric inside a signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedMetric {
    pub metric: EventMetric,
    pub observed_value: f64,
    /// How far the value sits outside its normal range
    pub severity_score: f64,
}

/// Metrics flagged for one node at one timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalySignature {
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    flagged: BTreeMap<EventMetric, FlaggedMetric>,
}

impl AnomalySignature {
    pub fn new(node_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            node_id: node_id.into(),
            timestamp,
            flagged: BTreeMap::new(),
        }
    }

    /// Add a flagged metric; a repeated metric keeps its strongest reading
    pub fn flag(&mut self, metric: EventMetric, observed_value: f64, severity_score: f64) {
        let entry = FlaggedMetric {
            metric,
            observed_value,
            severity_score,
        };
        match self.flagged.get(&metric) {
            Some(existing) if existing.severity_score >= severity_score => {}
            _ => {
                self.flagged.insert(metric, entry);
            }
        }
    }

    /// Builder-style `flag`
    pub fn with(mut self, metric: EventMetric, observed_value: f64) -> Self {
        self.flag(metric, observed_value, 0.0);
        self
    }

    pub fn contains(&self, metric: EventMetric) -> bool {
        self.flagged.contains_key(&metric)
    }

    /// Whether `metric` is the only flagged metric
    pub fn is_only(&self, metric: EventMetric) -> bool {
        self.flagged.len() == 1 && self.contains(metric)
    }

    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }

    pub fn value(&self, metric: EventMetric) -> Option<f64> {
        self.flagged.get(&metric).map(|f| f.observed_value)
    }

    /// Flagged metrics in canonical order
    pub fn flagged(&self) -> impl Iterator<Item = &FlaggedMetric> {
        self.flagged.values()
    }

    /// `cpu=92.50, memory=87.10` style listing
    pub fn describe(&self) -> String {
        self.flagged
            .values()
            .map(|f| format!("{}={:.2}", f.metric, f.observed_value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Group events into signatures, ordered by first appearance
pub fn group_events(events: &[AnomalyEvent]) -> Vec<AnomalySignature> {
    let mut index: HashMap<(&str, DateTime<Utc>), usize> = HashMap::new();
    let mut signatures: Vec<AnomalySignature> = Vec::new();

    for event in events {
        let key = (event.node_id.as_str(), event.timestamp);
        let slot = *index.entry(key).or_insert_with(|| {
            signatures.push(AnomalySignature::new(&event.node_id, event.timestamp));
            signatures.len() - 1
        });
        signatures[slot].flag(event.metric, event.observed_value, event.severity_score);
    }

    signatures
}
