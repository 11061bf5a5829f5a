//! CSV metrics source
//!
//! Reads the `timestamp,node,cpu,memory,latency_ms` table. Column order does
//! not matter; `node_id` and `latency` are accepted as header aliases.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::MetricsSource;
use crate::error::{Result, TriageError};
use crate::models::MetricRecord;
use crate::store::MetricStore;

/// Raw CSV row; every field optional so missing values can be reported by name
#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: Option<String>,
    #[serde(alias = "node_id")]
    node: Option<String>,
    cpu: Option<String>,
    memory: Option<String>,
    #[serde(alias = "latency")]
    latency_ms: Option<String>,
}

#[derive(Debug, Serialize)]
struct CsvRowOut<'a> {
    timestamp: String,
    node: &'a str,
    cpu: f64,
    memory: f64,
    latency_ms: f64,
}

/// Metrics source backed by a CSV file
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse records from any reader.
    ///
    /// Fails on the first malformed row, naming its line (header is line 1).
    pub fn read_records<R: Read>(reader: R) -> Result<Vec<MetricRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<CsvRow>().enumerate() {
            let label = format!("line {}", idx + 2);
            let row = row.map_err(|e| {
                if e.is_io_error() {
                    TriageError::Csv(e)
                } else {
                    TriageError::malformed(&label, "row", e.to_string())
                }
            })?;
            let record = parse_row(row, &label)?;
            record.validate(&label)?;
            records.push(record);
        }

        Ok(records)
    }
}

impl MetricsSource for CsvSource {
    fn load(&self) -> Result<MetricStore> {
        let file = File::open(&self.path)?;
        let records = Self::read_records(BufReader::new(file))?;
        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            "Loaded metric records"
        );
        Ok(MetricStore::from_validated(records))
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

fn parse_row(row: CsvRow, label: &str) -> Result<MetricRecord> {
    let timestamp = required(row.timestamp, label, "timestamp")?;
    let timestamp = parse_timestamp(&timestamp).ok_or_else(|| {
        TriageError::malformed(label, "timestamp", format!("cannot parse '{}'", timestamp))
    })?;
    let node_id = required(row.node, label, "node")?;

    Ok(MetricRecord {
        timestamp,
        node_id,
        cpu: parse_value(row.cpu, label, "cpu")?,
        memory: parse_value(row.memory, label, "memory")?,
        latency: parse_value(row.latency_ms, label, "latency_ms")?,
    })
}

fn required(value: Option<String>, label: &str, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(TriageError::malformed(label, field, "missing value")),
    }
}

fn parse_value(value: Option<String>, label: &str, field: &str) -> Result<f64> {
    let raw = required(value, label, field)?;
    raw.parse::<f64>()
        .map_err(|_| TriageError::malformed(label, field, format!("'{}' is not a number", raw)))
}

/// Parse an RFC 3339 or `YYYY-MM-DD HH:MM:SS[.fff][±HH:MM]` timestamp.
///
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    None
}

/// Write records as a CSV table readable by `CsvSource`
pub fn write_records<W: Write>(writer: W, records: &[MetricRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(CsvRowOut {
            timestamp: record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            node: &record.node_id,
            cpu: record.cpu,
            memory: record.memory,
            latency_ms: record.latency,
        })?;
    }
    writer.flush()?;
    Ok(())
}
