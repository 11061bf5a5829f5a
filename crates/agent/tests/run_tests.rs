//! Integration tests for a full agent run

use std::fs::{self, File};
use std::path::Path;
use std::process::{Command, Output};

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;
use triage_lib::export::{ANOMALIES_FILE, METRICS_FILE, REPORTS_JSON_FILE, REPORTS_TEXT_FILE};
use triage_lib::ingest::write_records;
use triage_lib::{MetricRecord, ResultExporter, Severity};

/// node-b spikes cpu and memory together at row 20
fn spiking_records() -> Vec<MetricRecord> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..25)
        .map(|i| {
            let bump = if i % 2 == 0 { 0.0 } else { 2.0 };
            let (cpu, memory) = if i == 20 {
                (56.0, 66.0)
            } else {
                (50.0 + bump, 60.0 + bump)
            };
            MetricRecord::new(
                start + Duration::seconds(20 * i as i64),
                "node-b",
                cpu,
                memory,
                80.0 + bump,
            )
        })
        .collect()
}

fn write_config(dir: &Path, input: &Path) -> std::path::PathBuf {
    let config_path = dir.join("config.yaml");
    let contents = format!(
        "source:\n  kind: csv\n  path: {}\nnotifier:\n  print: true\n  log: true\nruntime:\n  output_dir: {}\n  node_name: test-runner\n",
        input.display(),
        dir.join("out").display()
    );
    fs::write(&config_path, contents).unwrap();
    config_path
}

fn run_agent(config_path: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_triage-agent"))
        .env("TRIAGE_CONFIG", config_path)
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to execute triage-agent")
}

#[test]
fn test_run_exports_results() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("metrics.csv");
    write_records(File::create(&input).unwrap(), &spiking_records()).unwrap();

    let output = run_agent(&write_config(dir.path(), &input));
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("node-b"));
    assert!(stdout.contains("memory leak or workload saturation"));

    let out = dir.path().join("out");
    for name in [ANOMALIES_FILE, REPORTS_TEXT_FILE, REPORTS_JSON_FILE, METRICS_FILE] {
        assert!(out.join(name).exists(), "missing {}", name);
    }

    let exporter = ResultExporter::new(&out);
    assert_eq!(exporter.read_anomalies().unwrap().len(), 2);
    let reports = exporter.read_reports().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].severity, Severity::Critical);

    let metrics = fs::read_to_string(out.join(METRICS_FILE)).unwrap();
    assert!(metrics.contains("triage_records_ingested_total 25"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"event\":\"incident_report\""));
}

#[test]
fn test_malformed_input_fails_run() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("metrics.csv");
    fs::write(
        &input,
        "timestamp,node,cpu,memory,latency_ms\n2024-01-01T00:00:00Z,node-a,35,40,-5\n",
    )
    .unwrap();

    let output = run_agent(&write_config(dir.path(), &input));
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2"));
    assert!(!dir.path().join("out").join(REPORTS_JSON_FILE).exists());
}

#[test]
fn test_missing_input_fails_run() {
    let dir = TempDir::new().unwrap();
    let output = run_agent(&write_config(dir.path(), &dir.path().join("absent.csv")));
    assert!(!output.status.success());
}
