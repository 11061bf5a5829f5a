//! Metric ingestion
//!
//! This module provides the sources that fill the metric record store.
//! The CSV source reads the delimited table produced by exporters and by the
//! simulator; other sources (e.g. a pull-based metrics API) plug in through
//! the `MetricsSource` trait.

mod csv_source;
mod simulator;


pub use csv_source::{parse_timestamp, write_records, CsvSource};
pub use simulator::{MetricsSimulator, SimulationConfig};

use crate::error::{Result, TriageError};
use crate::settings::SourceSettings;
use crate::store::MetricStore;

/// Trait for metric source implementations
pub trait MetricsSource: Send + Sync {
    /// Load one snapshot of records into a store
    fn load(&self) -> Result<MetricStore>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Create the source selected by the settings
pub fn create_source(settings: &SourceSettings) -> Result<Box<dyn MetricsSource>> {
    match settings.kind.as_str() {
        "csv" => {
            tracing::info!(path = %settings.path.display(), "Using CSV metrics source");
            Ok(Box::new(CsvSource::new(&settings.path)))
        }
        other => Err(TriageError::UnsupportedSource(other.to_string())),
    }
}
