//! Agent configuration
//!
//! Settings come from an optional YAML file (path from `TRIAGE_CONFIG`,
//! default `configs/config.yaml`) overridden by `TRIAGE__SECTION__KEY`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use triage_lib::settings::{Contamination, TriageSettings};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "TRIAGE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// File the settings were read from, when it existed
    pub config_path: Option<PathBuf>,
    pub settings: TriageSettings,
}

impl AgentConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("TRIAGE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("detection.metrics"),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let settings: TriageSettings = config
            .try_deserialize()
            .context("Invalid triage configuration")?;
        validate(&settings)?;

        Ok(Self {
            config_path: path.exists().then(|| path.to_path_buf()),
            settings,
        })
    }
}

/// Range checks the core relies on
pub fn validate(settings: &TriageSettings) -> Result<()> {
    let detection = &settings.detection;
    if detection.rolling_window == 0 {
        bail!("detection.rolling_window must be at least 1");
    }
    if !(detection.zscore_threshold.is_finite() && detection.zscore_threshold > 0.0) {
        bail!(
            "detection.zscore_threshold must be positive, got {}",
            detection.zscore_threshold
        );
    }
    if detection.metrics.is_empty() {
        bail!("detection.metrics must name at least one metric");
    }
    if let Contamination::Fraction(fraction) = detection.contamination {
        if !(fraction > 0.0 && fraction <= 0.5) {
            bail!(
                "detection.contamination must be in (0, 0.5] or \"auto\", got {}",
                fraction
            );
        }
    }
    if detection.n_estimators == 0 {
        bail!("detection.n_estimators must be at least 1");
    }
    if detection.max_samples < 2 {
        bail!("detection.max_samples must be at least 2");
    }
    Ok(())
}
