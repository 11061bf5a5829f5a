//! Run orchestration
//!
//! One run is: detect anomalies over a loaded store, summarize them into
//! incident reports, and record run metrics and logs along the way. Loading
//! the store and delivering the reports stay with the caller.

use std::time::Instant;

use crate::anomaly::{create_detector, AnomalyDetector};
use crate::models::AnomalyEvent;
use crate::observability::{RunMetrics, StructuredLogger};
use crate::settings::TriageSettings;
use crate::store::MetricStore;
use crate::summarizer::{IncidentReport, IncidentSummarizer};

/// Output of one triage run
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Anomaly events in detection order
    pub events: Vec<AnomalyEvent>,
    /// Incident reports, at most `limit_alerts`
    pub reports: Vec<IncidentReport>,
}

impl RunOutcome {
    pub fn is_quiet(&self) -> bool {
        self.events.is_empty()
    }
}

/// Detector plus summarizer, wired from settings
pub struct TriagePipeline {
    detector: Box<dyn AnomalyDetector>,
    summarizer: IncidentSummarizer,
    metrics: RunMetrics,
    logger: StructuredLogger,
}

impl TriagePipeline {
    pub fn new(settings: &TriageSettings) -> Self {
        Self::with_parts(
            create_detector(&settings.detection),
            IncidentSummarizer::from_settings(&settings.runtime),
            StructuredLogger::new(settings.runtime.node_name.clone()),
        )
    }

    pub fn with_parts(
        detector: Box<dyn AnomalyDetector>,
        summarizer: IncidentSummarizer,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            detector,
            summarizer,
            metrics: RunMetrics::new(),
            logger,
        }
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Detect and summarize one snapshot of the store
    pub fn run(&self, store: &MetricStore) -> RunOutcome {
        self.metrics.add_records_ingested(store.len());
        self.logger.log_ingested(store.len(), store.node_count());

        let start = Instant::now();
        let events = self.detector.detect(store);
        let elapsed = start.elapsed().as_secs_f64();

        self.metrics.observe_detection_latency(elapsed);
        self.metrics.record_events(&events);
        self.logger
            .log_detection(self.detector.name(), store.len(), events.len(), elapsed);
        for event in &events {
            self.logger.log_anomaly(event);
        }

        let reports = self.summarizer.summarize(&events);
        self.metrics.record_reports(&reports);
        self.logger.log_run_finished(events.len(), reports.len());

        RunOutcome { events, reports }
    }
}
