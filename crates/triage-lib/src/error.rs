//! Error types for the triage library

use thiserror::Error;

/// Errors surfaced by ingestion, export and notification
#[derive(Debug, Error)]
pub enum TriageError {
    /// A record is missing a required field or carries an invalid value.
    /// Fatal for the run: dropping it silently could hide a real incident.
    #[error("Malformed record {record} (field '{field}'): {reason}")]
    MalformedRecord {
        record: String,
        field: String,
        reason: String,
    },

    #[error("Invalid simulation parameters: {0}")]
    InvalidSimulation(String),

    #[error("Unsupported metrics source kind: {0}")]
    UnsupportedSource(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Notification failed: {0}")]
    Notify(String),
}

impl TriageError {
    pub fn malformed(
        record: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TriageError::MalformedRecord {
            record: record.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for triage operations
pub type Result<T> = std::result::Result<T, TriageError>;
