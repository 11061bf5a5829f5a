//! In-memory metric record store
//!
//! Holds one static snapshot of the ingested records, ordered by timestamp.
//! Same-timestamp records keep their arrival order, which is what the rolling
//! windows rely on.

use std::collections::HashMap;

use crate::error::Result;
use crate::models::MetricRecord;

/// Ordered table of metric records shared by all detectors
#[derive(Debug, Clone, Default)]
pub struct MetricStore {
    records: Vec<MetricRecord>,
}

impl MetricStore {
    /// Validate and order records.
    ///
    /// Records are labelled by their 1-based arrival position in errors.
    pub fn from_records(records: Vec<MetricRecord>) -> Result<Self> {
        for (idx, record) in records.iter().enumerate() {
            record.validate(&format!("#{}", idx + 1))?;
        }
        Ok(Self::from_validated(records))
    }

    /// Order records that were already validated by the caller
    pub(crate) fn from_validated(mut records: Vec<MetricRecord>) -> Self {
        // Stable sort keeps arrival order for equal timestamps
        records.sort_by_key(|r| r.timestamp);
        Self { records }
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct nodes in the store
    pub fn node_count(&self) -> usize {
        self.node_series().len()
    }

    /// Per-node record sequences, nodes in order of first appearance
    pub fn node_series(&self) -> Vec<(&str, Vec<&MetricRecord>)> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut series: Vec<(&str, Vec<&MetricRecord>)> = Vec::new();

        for record in &self.records {
            let node = record.node_id.as_str();
            let slot = *index.entry(node).or_insert_with(|| {
                series.push((node, Vec::new()));
                series.len() - 1
            });
            series[slot].1.push(record);
        }

        series
    }
}
