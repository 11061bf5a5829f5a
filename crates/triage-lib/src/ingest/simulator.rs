//! Synthetic metric generation for demos and backtests
//!
//! Produces a seeded series with a periodic load pattern, Gaussian noise and
//! a handful of injected CPU spikes spread over a small set of nodes.

use std::f64::consts::PI;

use chrono::{DateTime, Duration, Utc};
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

use crate::error::{Result, TriageError};
use crate::models::MetricRecord;

/// Standard deviation of the memory noise, in percent
const MEMORY_NOISE: f64 = 6.0;
/// Standard deviation of the latency noise, in milliseconds
const LATENCY_NOISE: f64 = 10.0;

/// Parameters for a simulated series
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub start: DateTime<Utc>,
    /// Number of records to generate
    pub periods: usize,
    /// Seconds between consecutive records
    pub interval_secs: i64,
    /// Base CPU usage percentage
    pub cpu_base: f64,
    /// Standard deviation of the CPU noise
    pub cpu_noise: f64,
    /// Number of CPU spikes to inject
    pub spikes: usize,
    pub nodes: Vec<String>,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: Utc::now() - Duration::minutes(300),
            periods: 900,
            interval_secs: 20,
            cpu_base: 35.0,
            cpu_noise: 6.0,
            spikes: 12,
            nodes: vec![
                "node-a".to_string(),
                "node-b".to_string(),
                "node-c".to_string(),
            ],
            seed: 7,
        }
    }
}

/// Seeded generator of synthetic node metrics
pub struct MetricsSimulator {
    config: SimulationConfig,
    rng: ChaCha8Rng,
    cpu_noise: Normal<f64>,
    memory_noise: Normal<f64>,
    latency_noise: Normal<f64>,
}

impl MetricsSimulator {
    /// Fails when `cpu_noise` is negative or not finite
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let cpu_noise = noise(config.cpu_noise)?;
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            cpu_noise,
            memory_noise: noise(MEMORY_NOISE)?,
            latency_noise: noise(LATENCY_NOISE)?,
            config,
        })
    }

    /// Generate the series in timestamp order
    pub fn generate(&mut self) -> Vec<MetricRecord> {
        let periods = self.config.periods;
        if periods == 0 || self.config.nodes.is_empty() {
            return Vec::new();
        }

        let step = if periods > 1 {
            4.0 * PI / (periods - 1) as f64
        } else {
            0.0
        };

        let mut cpu: Vec<f64> = (0..periods)
            .map(|i| {
                let x = step * i as f64;
                self.config.cpu_base + self.rng.sample(self.cpu_noise) + 8.0 * x.sin()
            })
            .collect();

        let spikes = self.config.spikes.min(periods);
        for idx in index::sample(&mut self.rng, periods, spikes).into_iter() {
            cpu[idx] += self.rng.gen_range(35.0..60.0);
        }

        let mut records = Vec::with_capacity(periods);
        for (i, cpu) in cpu.into_iter().enumerate() {
            let x = step * i as f64;
            let node = self
                .config
                .nodes
                .choose(&mut self.rng)
                .cloned()
                .unwrap_or_default();
            let memory = 40.0 + self.rng.sample(self.memory_noise) + 6.0 * x.cos();
            let latency = 80.0 + 15.0 * (2.0 * x).sin() + self.rng.sample(self.latency_noise);

            records.push(MetricRecord {
                timestamp: self.config.start
                    + Duration::seconds(self.config.interval_secs * i as i64),
                node_id: node,
                cpu: cpu.clamp(0.0, 100.0),
                memory: memory.clamp(0.0, 100.0),
                latency: latency.clamp(10.0, 400.0),
            });
        }

        records
    }

}

/// Zero-mean normal noise with the given standard deviation
fn noise(std_dev: f64) -> Result<Normal<f64>> {
    if !std_dev.is_finite() {
        return Err(TriageError::InvalidSimulation(format!(
            "noise standard deviation must be finite, got {}",
            std_dev
        )));
    }
    Normal::new(0.0, std_dev).map_err(|e| {
        TriageError::InvalidSimulation(format!("noise standard deviation {}: {}", std_dev, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(seed: u64) -> SimulationConfig {
        SimulationConfig {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            periods: 300,
            seed,
            ..Default::default()
        }
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = MetricsSimulator::new(config(11)).unwrap().generate();
        let b = MetricsSimulator::new(config(11)).unwrap().generate();
        assert_eq!(a, b);
    }

    #[test]
    fn test_values_within_ranges() {
        let records = MetricsSimulator::new(config(3)).unwrap().generate();
        assert_eq!(records.len(), 300);
        for record in &records {
            assert!(record.validate("sim").is_ok());
            assert!((10.0..=400.0).contains(&record.latency));
        }
    }

    #[test]
    fn test_timestamps_increase() {
        let records = MetricsSimulator::new(config(5)).unwrap().generate();
        assert!(records.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(
            (records[1].timestamp - records[0].timestamp).num_seconds(),
            20
        );
    }

    #[test]
    fn test_spikes_injected() {
        let records = MetricsSimulator::new(config(9)).unwrap().generate();
        let high = records.iter().filter(|r| r.cpu > 70.0).count();
        assert!(high >= 1, "expected at least one injected spike");
    }

    #[test]
    fn test_invalid_noise_rejected() {
        for cpu_noise in [-1.0, f64::NAN, f64::INFINITY] {
            let cfg = SimulationConfig {
                cpu_noise,
                ..config(1)
            };
            assert!(matches!(
                MetricsSimulator::new(cfg),
                Err(TriageError::InvalidSimulation(_))
            ));
        }
    }

    #[test]
    fn test_zero_noise_is_deterministic_baseline() {
        let cfg = SimulationConfig {
            cpu_noise: 0.0,
            spikes: 0,
            ..config(1)
        };
        let records = MetricsSimulator::new(cfg).unwrap().generate();
        // cpu_base + 8 sin(0)
        assert!((records[0].cpu - 35.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_periods() {
        let cfg = SimulationConfig {
            periods: 0,
            ..config(1)
        };
        assert!(MetricsSimulator::new(cfg).unwrap().generate().is_empty());
    }
}
