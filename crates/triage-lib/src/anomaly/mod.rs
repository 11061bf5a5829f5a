//! Anomaly detection over the metric record store
//!
//! This module provides two interchangeable strategies:
//! - Rolling z-score: per-node, per-metric deviation from a trailing window
//! - Isolation forest: multivariate outlier scoring over all records
//!
//! Both implement `AnomalyDetector` and are selected from settings, so the
//! summarizer and the pipeline never depend on a concrete strategy.

mod isolation_forest;
mod zscore_detector;

pub use isolation_forest::{average_path_length, IsolationForest, IsolationForestDetector};
pub use zscore_detector::{RollingWindow, ZScoreDetector};

use crate::models::AnomalyEvent;
use crate::settings::{DetectionSettings, DetectionStrategy};
use crate::store::MetricStore;

/// Capability shared by detection strategies: records in, events out
pub trait AnomalyDetector: Send + Sync {
    /// Detect anomalies in one snapshot of the store.
    ///
    /// Insufficient data is never an error: the affected points simply
    /// produce no events.
    fn detect(&self, store: &MetricStore) -> Vec<AnomalyEvent>;

    /// Strategy name for logs and metrics labels
    fn name(&self) -> &'static str;
}

/// Create the detector selected by the settings
pub fn create_detector(settings: &DetectionSettings) -> Box<dyn AnomalyDetector> {
    match settings.method {
        DetectionStrategy::RollingZscore => {
            tracing::info!(
                window = settings.rolling_window,
                threshold = settings.zscore_threshold,
                "Using rolling z-score detector"
            );
            Box::new(ZScoreDetector::from_settings(settings))
        }
        DetectionStrategy::IsolationForest => {
            tracing::info!(
                n_estimators = settings.n_estimators,
                contamination = ?settings.contamination,
                seed = settings.seed,
                "Using isolation forest detector"
            );
            Box::new(IsolationForestDetector::from_settings(settings))
        }
    }
}

/// Mean and population standard deviation of a sample.
///
/// A sample whose values are all equal has a standard deviation of exactly
/// zero, even when the computed mean carries rounding error.
pub(crate) fn population_stats<I>(values: I) -> (f64, f64)
where
    I: Iterator<Item = f64> + Clone,
{
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.clone() {
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    if count == 0 {
        return (0.0, 0.0);
    }

    let mean = sum / count as f64;
    if max == min {
        return (mean, 0.0);
    }

    // Two-pass population variance
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_sample_has_zero_std() {
        for value in [37.3, 41.7, 80.3, 0.1] {
            let samples = vec![value; 20];
            let (mean, std_dev) = population_stats(samples.iter().copied());
            assert!((mean - value).abs() < 1e-12);
            assert_eq!(std_dev, 0.0);
        }
    }

    #[test]
    fn test_population_stats() {
        let (mean, std_dev) = population_stats([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter());
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std_dev - 2.0).abs() < 1e-12);
        assert_eq!(population_stats(std::iter::empty()), (0.0, 0.0));
    }
}
