//! Rolling z-score detection
//!
//! Flags a metric value when it deviates from the mean of the preceding
//! `window` same-node records by at least `threshold` standard deviations.
//! Only data at or before each point is used, so results are replay-safe.

use std::collections::{HashMap, VecDeque};

use super::{population_stats, AnomalyDetector};
use crate::models::{AnomalyEvent, DetectionMethod, Metric, MetricRecord};
use crate::settings::DetectionSettings;
use crate::store::MetricStore;

/// Default number of prior records in the window
const DEFAULT_WINDOW: usize = 20;

/// Detects per-metric deviations from a trailing window
pub struct ZScoreDetector {
    /// Number of standard deviations to consider anomalous
    pub threshold: f64,
    /// Number of prior same-node records in the window
    pub window: usize,
    /// Metrics to evaluate
    pub metrics: Vec<Metric>,
}

impl ZScoreDetector {
    /// Create a new detector with given threshold over all metrics
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            window: DEFAULT_WINDOW,
            metrics: Metric::ALL.to_vec(),
        }
    }

    /// Set custom window size
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Restrict detection to the given metrics
    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self::new(settings.zscore_threshold)
            .with_window(settings.rolling_window)
            .with_metrics(settings.metrics.clone())
    }

    /// Z-score of `current` against a full window.
    ///
    /// # Returns
    /// * `Some(z)` if `|z|` reaches the threshold
    /// * `None` if the window is not full, has zero variance, or the value is normal
    pub fn evaluate(&self, current: f64, history: &RollingWindow) -> Option<f64> {
        if !history.is_full() {
            return None;
        }

        // Constant window: no deviation is measurable
        if history.std_dev == 0.0 {
            return None;
        }

        let z_score = (current - history.mean) / history.std_dev;
        if z_score.abs() >= self.threshold {
            Some(z_score)
        } else {
            None
        }
    }

    fn event(
        &self,
        record: &MetricRecord,
        metric: Metric,
        z_score: f64,
        mean: f64,
    ) -> AnomalyEvent {
        AnomalyEvent {
            timestamp: record.timestamp,
            node_id: record.node_id.clone(),
            metric: metric.into(),
            observed_value: record.value(metric),
            reference_value: mean,
            severity_score: z_score.abs(),
            method: DetectionMethod::ZScore,
        }
    }
}

impl Default for ZScoreDetector {
    fn default() -> Self {
        Self::new(3.0) // 3 sigma
    }
}

impl AnomalyDetector for ZScoreDetector {
    fn detect(&self, store: &MetricStore) -> Vec<AnomalyEvent> {
        let mut windows: HashMap<&str, Vec<RollingWindow>> = HashMap::new();
        let mut events = Vec::new();

        for record in store.records() {
            let node_windows = windows
                .entry(record.node_id.as_str())
                .or_insert_with(|| vec![RollingWindow::new(self.window); Metric::ALL.len()]);

            for &metric in &self.metrics {
                let window = &node_windows[metric.index()];
                if let Some(z_score) = self.evaluate(record.value(metric), window) {
                    events.push(self.event(record, metric, z_score, window.mean));
                }
            }

            // The current point joins the window only after it was evaluated
            for metric in Metric::ALL {
                node_windows[metric.index()].push(record.value(metric));
            }
        }

        events
    }

    fn name(&self) -> &'static str {
        "rolling_zscore"
    }
}

/// Count-based rolling window statistics
///
/// Keeps the most recent `capacity` samples and their mean and population
/// standard deviation.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    /// Current mean value
    pub mean: f64,
    /// Current population standard deviation
    pub std_dev: f64,
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            mean: 0.0,
            std_dev: 0.0,
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Add a sample, evicting the oldest once the window is full
    pub fn push(&mut self, value: f64) {
        self.samples.push_back(value);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        self.recalculate_stats();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether the window holds `capacity` samples
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Recalculate mean and std_dev from current samples
    fn recalculate_stats(&mut self) {
        let (mean, std_dev) = population_stats(self.samples.iter().copied());
        self.mean = mean;
        self.std_dev = std_dev;
    }
}
