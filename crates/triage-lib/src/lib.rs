//! Library for infrastructure metrics triage
//!
//! This crate provides the core functionality for:
//! - Metric ingestion (CSV source, synthetic simulator)
//! - Anomaly detection (rolling z-score, isolation forest)
//! - Rule-based incident summarization
//! - Report notification and result export
//! - Run metrics and structured logging

pub mod anomaly;
pub mod error;
pub mod export;
pub mod ingest;
pub mod models;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod settings;
pub mod store;
pub mod summarizer;

pub use error::{Result, TriageError};
pub use export::ResultExporter;
pub use models::*;
pub use notify::{ConsoleNotifier, LogNotifier, Notifier, NotifierSet};
pub use observability::{RunMetrics, StructuredLogger};
pub use pipeline::{RunOutcome, TriagePipeline};
pub use settings::TriageSettings;
pub use store::MetricStore;
pub use summarizer::{IncidentReport, IncidentSummarizer, Severity};
