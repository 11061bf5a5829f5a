//! Isolation forest detection
//!
//! Fits an ensemble of random isolation trees over the `(cpu, memory,
//! latency)` vectors of every record in one batch and scores each record by
//! how quickly it is isolated. Nothing is kept between runs; a fixed seed
//! makes every fit reproducible.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{population_stats, AnomalyDetector};
use crate::models::{AnomalyEvent, DetectionMethod, EventMetric, Metric, MetricRecord};
use crate::settings::{Contamination, DetectionSettings, EventShape};
use crate::store::MetricStore;

/// Minimum records needed to fit a model
const MIN_RECORDS_FOR_FIT: usize = 2;

/// Number of features per record
const N_FEATURES: usize = 3;

/// Score threshold used with `Contamination::Auto`
const AUTO_THRESHOLD: f64 = 0.5;

/// Euler-Mascheroni constant for the harmonic number approximation
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn path_length(&self, x: &[f64; N_FEATURES], depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                value,
                left,
                right,
            } => {
                if x[*feature] < *value {
                    left.path_length(x, depth + 1)
                } else {
                    right.path_length(x, depth + 1)
                }
            }
        }
    }
}

/// Fitted ensemble of isolation trees
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit `n_estimators` trees, each on `min(max_samples, n)` rows drawn
    /// without replacement.
    pub fn fit(
        data: &[[f64; N_FEATURES]],
        n_estimators: usize,
        max_samples: usize,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let sample_size = max_samples.clamp(1, data.len().max(1));
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..n_estimators.max(1))
            .map(|_| {
                let rows = index::sample(rng, data.len(), sample_size).into_vec();
                build_tree(data, rows, 0, height_limit, rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Anomaly score in (0, 1]; values near 1 are easy to isolate
    pub fn score(&self, x: &[f64; N_FEATURES]) -> f64 {
        let normaliser = average_path_length(self.sample_size);
        if normaliser <= 0.0 || self.trees.is_empty() {
            return AUTO_THRESHOLD;
        }

        let mean_depth = self
            .trees
            .iter()
            .map(|tree| tree.path_length(x, 0))
            .sum::<f64>()
            / self.trees.len() as f64;

        2f64.powf(-mean_depth / normaliser)
    }
}

fn build_tree(
    data: &[[f64; N_FEATURES]],
    rows: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut ChaCha8Rng,
) -> Node {
    if depth >= height_limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    // Only features that still vary can split this node
    let mut candidates = Vec::with_capacity(N_FEATURES);
    for feature in 0..N_FEATURES {
        let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
            (lo.min(data[r][feature]), hi.max(data[r][feature]))
        });
        if hi > lo {
            candidates.push((feature, lo, hi));
        }
    }

    if candidates.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let value = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.into_iter().partition(|&r| data[r][feature] < value);

    Node::Split {
        feature,
        value,
        left: Box::new(build_tree(data, left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(data, right, depth + 1, height_limit, rng)),
    }
}

/// Score cut-off separating normal from anomalous records
fn normality_threshold(scores: &[f64], contamination: Contamination) -> f64 {
    match contamination {
        Contamination::Auto => AUTO_THRESHOLD,
        Contamination::Fraction(fraction) => {
            let mut sorted = scores.to_vec();
            sorted.sort_by(f64::total_cmp);

            // (1 - contamination) quantile with linear interpolation
            let q = (1.0 - fraction).clamp(0.0, 1.0);
            let pos = q * (sorted.len() - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Marginal mean and population standard deviation per metric
fn marginal_stats(records: &[MetricRecord]) -> [(f64, f64); N_FEATURES] {
    let mut stats = [(0.0, 0.0); N_FEATURES];
    for metric in Metric::ALL {
        stats[metric.index()] = population_stats(records.iter().map(|r| r.value(metric)));
    }
    stats
}

/// Multivariate detector backed by an isolation forest
pub struct IsolationForestDetector {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: Contamination,
    pub seed: u64,
    /// Marginal deviation needed to attribute an anomalous row to a metric
    pub attribution_threshold: f64,
    pub shape: EventShape,
}

impl IsolationForestDetector {
    pub fn new(contamination: Contamination) -> Self {
        Self {
            contamination,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_shape(mut self, shape: EventShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self {
            n_estimators: settings.n_estimators,
            max_samples: settings.max_samples,
            contamination: settings.contamination,
            seed: settings.seed,
            attribution_threshold: settings.attribution_threshold,
            shape: settings.event_shape,
        }
    }

    /// Fit on the store and score every record.
    ///
    /// Returns `None` when there are too few records to fit.
    pub fn score_store(&self, store: &MetricStore) -> Option<(Vec<f64>, f64)> {
        if store.len() < MIN_RECORDS_FOR_FIT {
            return None;
        }

        let data: Vec<[f64; N_FEATURES]> = store.records().iter().map(|r| r.features()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let forest = IsolationForest::fit(&data, self.n_estimators, self.max_samples, &mut rng);

        let scores: Vec<f64> = data.iter().map(|x| forest.score(x)).collect();
        let threshold = normality_threshold(&scores, self.contamination);
        Some((scores, threshold))
    }

    /// Metrics of an anomalous row that diverge most from their marginals
    fn attribute(
        &self,
        record: &MetricRecord,
        stats: &[(f64, f64); N_FEATURES],
    ) -> Vec<(Metric, f64)> {
        let deviations: Vec<(Metric, f64)> = Metric::ALL
            .iter()
            .map(|&metric| {
                let (mean, std_dev) = stats[metric.index()];
                let deviation = if std_dev == 0.0 {
                    0.0
                } else {
                    (record.value(metric) - mean).abs() / std_dev
                };
                (metric, deviation)
            })
            .collect();

        let flagged: Vec<(Metric, f64)> = deviations
            .iter()
            .copied()
            .filter(|(_, deviation)| *deviation >= self.attribution_threshold)
            .collect();

        if !flagged.is_empty() {
            return flagged;
        }

        deviations
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .into_iter()
            .collect()
    }
}

impl Default for IsolationForestDetector {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_samples: 256,
            contamination: Contamination::default(),
            seed: 42,
            attribution_threshold: 2.0,
            shape: EventShape::PerMetric,
        }
    }
}

impl AnomalyDetector for IsolationForestDetector {
    fn detect(&self, store: &MetricStore) -> Vec<AnomalyEvent> {
        let Some((scores, threshold)) = self.score_store(store) else {
            tracing::debug!(records = store.len(), "Too few records to fit isolation forest");
            return Vec::new();
        };

        let stats = marginal_stats(store.records());
        let mut events = Vec::new();

        for (record, &score) in store.records().iter().zip(scores.iter()) {
            if score <= threshold {
                continue;
            }

            match self.shape {
                EventShape::Joint => events.push(AnomalyEvent {
                    timestamp: record.timestamp,
                    node_id: record.node_id.clone(),
                    metric: EventMetric::Composite,
                    observed_value: score,
                    reference_value: threshold,
                    severity_score: score / threshold,
                    method: DetectionMethod::IsolationForest,
                }),
                EventShape::PerMetric => {
                    for (metric, deviation) in self.attribute(record, &stats) {
                        events.push(AnomalyEvent {
                            timestamp: record.timestamp,
                            node_id: record.node_id.clone(),
                            metric: metric.into(),
                            observed_value: record.value(metric),
                            reference_value: score,
                            severity_score: deviation,
                            method: DetectionMethod::IsolationForest,
                        });
                    }
                }
            }
        }

        events
    }

    fn name(&self) -> &'static str {
        "isolation_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::BTreeSet;

    fn ts(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(20 * i as i64)
    }

    /// 100 bounded, smoothly varying rows plus two far outliers at rows 37 and 81
    fn dataset() -> Vec<MetricRecord> {
        let mut records: Vec<MetricRecord> = (0..102)
            .map(|i| {
                let x = i as f64;
                MetricRecord::new(
                    ts(i),
                    ["node-a", "node-b", "node-c"][i % 3],
                    35.0 + 5.0 * (0.7 * x).sin(),
                    40.0 + 6.0 * (1.3 * x).cos(),
                    80.0 + 10.0 * (2.1 * x).sin(),
                )
            })
            .collect();

        records[37].cpu = 99.0;
        records[37].memory = 97.0;
        records[37].latency = 390.0;
        records[81].cpu = 95.0;
        records[81].memory = 92.0;
        records[81].latency = 360.0;
        records
    }

    fn flagged_rows(events: &[AnomalyEvent]) -> BTreeSet<DateTime<Utc>> {
        events.iter().map(|e| e.timestamp).collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.244).abs() < 0.01);
    }

    #[test]
    fn test_detects_obvious_outliers() {
        let store = MetricStore::from_records(dataset()).unwrap();
        let events = IsolationForestDetector::default().detect(&store);

        let rows = flagged_rows(&events);
        assert!(rows.contains(&ts(37)));
        assert!(rows.contains(&ts(81)));
        // 2% of 102 rows leaves room for at most one extra row
        assert!(rows.len() <= 3, "flagged {} rows", rows.len());
    }

    #[test]
    fn test_outliers_score_highest() {
        let store = MetricStore::from_records(dataset()).unwrap();
        let (scores, threshold) = IsolationForestDetector::default()
            .score_store(&store)
            .unwrap();

        let mut ranked: Vec<usize> = (0..scores.len()).collect();
        ranked.sort_by(|a, b| scores[*b].partial_cmp(&scores[*a]).unwrap());
        let top: BTreeSet<usize> = ranked[..2].iter().copied().collect();
        assert_eq!(top, BTreeSet::from([37, 81]));
        assert!(scores[37] > threshold);
        assert!(scores[37] > 0.5);
    }

    #[test]
    fn test_per_metric_attribution() {
        let store = MetricStore::from_records(dataset()).unwrap();
        let events = IsolationForestDetector::default().detect(&store);

        let outlier: Vec<&AnomalyEvent> = events.iter().filter(|e| e.timestamp == ts(37)).collect();
        let metrics: BTreeSet<EventMetric> = outlier.iter().map(|e| e.metric).collect();
        assert_eq!(
            metrics,
            BTreeSet::from([EventMetric::Cpu, EventMetric::Memory, EventMetric::Latency])
        );
        let cpu = outlier.iter().find(|e| e.metric == EventMetric::Cpu).unwrap();
        assert_eq!(cpu.observed_value, 99.0);
        assert_eq!(cpu.method, DetectionMethod::IsolationForest);
        assert!(cpu.severity_score >= 2.0);
    }

    #[test]
    fn test_constant_column_is_never_attributed() {
        let mut records: Vec<MetricRecord> = (0..50)
            .map(|i| {
                let cpu = if i % 2 == 0 { 30.0 } else { 40.0 };
                MetricRecord::new(ts(i), "node-a", cpu, 41.7, 80.3)
            })
            .collect();
        records[25].cpu = 99.0;

        let stats = marginal_stats(&records);
        assert_eq!(stats[Metric::Memory.index()].1, 0.0);
        assert_eq!(stats[Metric::Latency.index()].1, 0.0);

        let attributed = IsolationForestDetector::default().attribute(&records[25], &stats);
        let metrics: Vec<Metric> = attributed.iter().map(|(m, _)| *m).collect();
        assert_eq!(metrics, vec![Metric::Cpu]);
    }

    #[test]
    fn test_joint_shape_emits_one_event_per_row() {
        let store = MetricStore::from_records(dataset()).unwrap();
        let events = IsolationForestDetector::default()
            .with_shape(EventShape::Joint)
            .detect(&store);

        assert_eq!(events.len(), flagged_rows(&events).len());
        assert!(events.iter().all(|e| e.metric == EventMetric::Composite));
        assert!(events.iter().all(|e| e.severity_score > 1.0));
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let store = MetricStore::from_records(dataset()).unwrap();
        let a = IsolationForestDetector::default().with_seed(7).detect(&store);
        let b = IsolationForestDetector::default().with_seed(7).detect(&store);
        assert_eq!(a, b);
    }

    #[test]
    fn test_too_few_records() {
        let store = MetricStore::from_records(vec![MetricRecord::new(
            ts(0),
            "node-a",
            99.0,
            99.0,
            399.0,
        )])
        .unwrap();
        assert!(IsolationForestDetector::default().detect(&store).is_empty());
        assert!(IsolationForestDetector::default().detect(&MetricStore::default()).is_empty());
    }

    #[test]
    fn test_identical_rows_do_not_panic() {
        let records = (0..10)
            .map(|i| MetricRecord::new(ts(i), "node-a", 50.0, 50.0, 100.0))
            .collect();
        let store = MetricStore::from_records(records).unwrap();
        let (scores, _) = IsolationForestDetector::new(Contamination::Auto)
            .score_store(&store)
            .unwrap();
        assert!(scores.windows(2).all(|w| (w[0] - w[1]).abs() < 1e-12));
    }

    #[test]
    fn test_threshold_interpolation() {
        let scores = [0.1, 0.2, 0.3, 0.4, 0.5];
        let threshold = normality_threshold(&scores, Contamination::Fraction(0.25));
        assert!((threshold - 0.4).abs() < 1e-12);
        assert_eq!(normality_threshold(&scores, Contamination::Auto), 0.5);
    }
}
