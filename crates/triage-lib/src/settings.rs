//! Resolved run settings
//!
//! The structure handed to the core by the configuration loader. Every field
//! has a default so partial configuration files deserialize cleanly. The core
//! accepts these values as given; range checks belong to the loader.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::Metric;

/// Top-level settings for one triage run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageSettings {
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub detection: DetectionSettings,
    #[serde(default)]
    pub notifier: NotifierSettings,
    #[serde(default)]
    pub runtime: RuntimeSettings,
}

/// Where metric records come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Source kind, currently only `csv`
    #[serde(default = "default_source_kind")]
    pub kind: String,

    #[serde(default = "default_source_path")]
    pub path: PathBuf,
}

fn default_source_kind() -> String {
    "csv".to_string()
}

fn default_source_path() -> PathBuf {
    PathBuf::from("data/sample_metrics.csv")
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            path: default_source_path(),
        }
    }
}

/// Detection strategy selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    #[default]
    RollingZscore,
    IsolationForest,
}

impl std::fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionStrategy::RollingZscore => write!(f, "rolling_zscore"),
            DetectionStrategy::IsolationForest => write!(f, "isolation_forest"),
        }
    }
}

impl std::str::FromStr for DetectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rolling_zscore" | "zscore" => Ok(DetectionStrategy::RollingZscore),
            "isolation_forest" | "iforest" => Ok(DetectionStrategy::IsolationForest),
            other => Err(format!("unknown detection method '{}'", other)),
        }
    }
}

/// Shape of the events emitted by the isolation forest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventShape {
    /// One event per flagged metric of an anomalous row
    #[default]
    PerMetric,
    /// One composite event per anomalous row
    Joint,
}

/// Expected outlier proportion for the isolation forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ContaminationRepr", into = "ContaminationRepr")]
pub enum Contamination {
    /// Fixed score threshold of 0.5
    Auto,
    /// Fraction of training rows expected to be outliers
    Fraction(f64),
}

impl Default for Contamination {
    fn default() -> Self {
        Contamination::Fraction(0.02)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ContaminationRepr {
    Fraction(f64),
    Keyword(String),
}

impl TryFrom<ContaminationRepr> for Contamination {
    type Error = String;

    fn try_from(repr: ContaminationRepr) -> Result<Self, Self::Error> {
        match repr {
            ContaminationRepr::Fraction(value) => Ok(Contamination::Fraction(value)),
            ContaminationRepr::Keyword(word) if word.eq_ignore_ascii_case("auto") => {
                Ok(Contamination::Auto)
            }
            // Environment overrides arrive as strings
            ContaminationRepr::Keyword(word) => word
                .parse::<f64>()
                .map(Contamination::Fraction)
                .map_err(|_| format!("invalid contamination '{}'", word)),
        }
    }
}

impl From<Contamination> for ContaminationRepr {
    fn from(value: Contamination) -> Self {
        match value {
            Contamination::Auto => ContaminationRepr::Keyword("auto".to_string()),
            Contamination::Fraction(value) => ContaminationRepr::Fraction(value),
        }
    }
}

/// Detector parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSettings {
    #[serde(default)]
    pub method: DetectionStrategy,

    #[serde(default = "default_zscore_threshold")]
    pub zscore_threshold: f64,

    /// Number of prior same-node records in the rolling window
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,

    /// Metrics evaluated by the rolling z-score detector
    #[serde(default = "default_metrics")]
    pub metrics: Vec<Metric>,

    #[serde(default)]
    pub contamination: Contamination,

    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Marginal deviation needed to attribute a forest anomaly to a metric
    #[serde(default = "default_attribution_threshold")]
    pub attribution_threshold: f64,

    #[serde(default)]
    pub event_shape: EventShape,
}

fn default_zscore_threshold() -> f64 {
    3.0
}

fn default_rolling_window() -> usize {
    20
}

fn default_metrics() -> Vec<Metric> {
    Metric::ALL.to_vec()
}

fn default_n_estimators() -> usize {
    200
}

fn default_max_samples() -> usize {
    256
}

fn default_seed() -> u64 {
    42
}

fn default_attribution_threshold() -> f64 {
    2.0
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            method: DetectionStrategy::default(),
            zscore_threshold: default_zscore_threshold(),
            rolling_window: default_rolling_window(),
            metrics: default_metrics(),
            contamination: Contamination::default(),
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
            seed: default_seed(),
            attribution_threshold: default_attribution_threshold(),
            event_shape: EventShape::default(),
        }
    }
}

/// Notifier enable flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierSettings {
    /// Print colour-coded report blocks to stdout
    #[serde(default = "default_true")]
    pub print: bool,

    /// Emit each report as a structured log event
    #[serde(default)]
    pub log: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            print: true,
            log: false,
        }
    }
}

/// Which end of the report sequence survives truncation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truncation {
    #[default]
    Earliest,
    Latest,
}

/// Run-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default = "default_limit_alerts")]
    pub limit_alerts: usize,

    #[serde(default)]
    pub truncation: Truncation,

    /// Directory receiving the flat result exports
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Instance name attached to structured logs
    #[serde(default = "default_node_name")]
    pub node_name: String,
}

fn default_limit_alerts() -> usize {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            limit_alerts: default_limit_alerts(),
            truncation: Truncation::default(),
            output_dir: default_output_dir(),
            node_name: default_node_name(),
        }
    }
}
