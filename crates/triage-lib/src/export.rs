//! Flat-file export of run results
//!
//! One run overwrites the previous one. The directory holds:
//! - `last_anomalies.csv`: one row per anomaly event
//! - `last_reports.txt`: rendered report blocks separated by a blank line
//! - `last_reports.json`: the report array
//! - `run_metrics.prom`: Prometheus text exposition of the run metrics

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::AnomalyEvent;
use crate::summarizer::IncidentReport;

pub const ANOMALIES_FILE: &str = "last_anomalies.csv";
pub const REPORTS_TEXT_FILE: &str = "last_reports.txt";
pub const REPORTS_JSON_FILE: &str = "last_reports.json";
pub const METRICS_FILE: &str = "run_metrics.prom";

/// Writes and reads the result files of the most recent run
#[derive(Debug, Clone)]
pub struct ResultExporter {
    dir: PathBuf,
}

impl ResultExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn write_anomalies(&self, events: &[AnomalyEvent]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(ANOMALIES_FILE);

        let mut writer = csv::Writer::from_path(&path)?;
        for event in events {
            writer.serialize(event)?;
        }
        writer.flush()?;
        Ok(path)
    }

    pub fn write_reports(&self, reports: &[IncidentReport]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let text = reports
            .iter()
            .map(IncidentReport::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        fs::write(self.path(REPORTS_TEXT_FILE), text)?;

        let file = File::create(self.path(REPORTS_JSON_FILE))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, reports)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_metrics(&self, exposition: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(METRICS_FILE), exposition)?;
        Ok(())
    }

    /// Anomalies of the last run; an absent file reads as no anomalies
    pub fn read_anomalies(&self) -> Result<Vec<AnomalyEvent>> {
        let path = self.path(ANOMALIES_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut events = Vec::new();
        for row in reader.deserialize() {
            events.push(row?);
        }
        Ok(events)
    }

    /// Reports of the last run; an absent file reads as no reports
    pub fn read_reports(&self) -> Result<Vec<IncidentReport>> {
        let path = self.path(REPORTS_JSON_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectionMethod, EventMetric};
    use crate::summarizer::{AnomalySignature, IncidentClass};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn event(metric: EventMetric, value: f64) -> AnomalyEvent {
        AnomalyEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
            node_id: "node-b".to_string(),
            metric,
            observed_value: value,
            reference_value: 41.5,
            severity_score: 4.25,
            method: DetectionMethod::ZScore,
        }
    }

    fn report() -> IncidentReport {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let signature = AnomalySignature::new("node-b", ts)
            .with(EventMetric::Cpu, 92.5)
            .with(EventMetric::Memory, 87.1);
        IncidentReport::from_signature(&signature, IncidentClass::WorkloadSaturation)
    }

    #[test]
    fn test_anomalies_read_back() {
        let dir = tempdir().unwrap();
        let exporter = ResultExporter::new(dir.path());
        let events = vec![event(EventMetric::Cpu, 92.5), event(EventMetric::Memory, 87.1)];

        let path = exporter.write_anomalies(&events).unwrap();
        let header = std::fs::read_to_string(path).unwrap();
        assert!(header.starts_with(
            "timestamp,node_id,metric,observed_value,reference_value,severity_score,method"
        ));

        assert_eq!(exporter.read_anomalies().unwrap(), events);
    }

    #[test]
    fn test_reports_text_and_json() {
        let dir = tempdir().unwrap();
        let exporter = ResultExporter::new(dir.path().join("nested"));
        let reports = vec![report(), report()];

        exporter.write_reports(&reports).unwrap();

        let text = std::fs::read_to_string(exporter.dir().join(REPORTS_TEXT_FILE)).unwrap();
        assert_eq!(text.matches("[CRITICAL] node-b").count(), 2);
        assert!(text.contains("\n\n[CRITICAL]"));

        assert_eq!(exporter.read_reports().unwrap(), reports);
    }

    #[test]
    fn test_missing_files_read_empty() {
        let dir = tempdir().unwrap();
        let exporter = ResultExporter::new(dir.path());
        assert!(exporter.read_anomalies().unwrap().is_empty());
        assert!(exporter.read_reports().unwrap().is_empty());
    }

    #[test]
    fn test_metrics_written_verbatim() {
        let dir = tempdir().unwrap();
        let exporter = ResultExporter::new(dir.path());
        exporter
            .write_metrics("triage_records_ingested_total 25\n")
            .unwrap();

        let text = std::fs::read_to_string(dir.path().join(METRICS_FILE)).unwrap();
        assert_eq!(text, "triage_records_ingested_total 25\n");
    }
}
