//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

const DEFAULT_DATA_DIR: &str = "data";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory holding the last run's exported results
    pub data_dir: Option<PathBuf>,
    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(home.join(".config").join("triage").join("config.json"))
    }

    /// Results directory: explicit flag, then config, then `data`
    pub fn data_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    /// Output format: explicit flag, then config, then table
    pub fn format(&self, flag: Option<OutputFormat>) -> Result<OutputFormat> {
        if let Some(format) = flag {
            return Ok(format);
        }
        match &self.default_format {
            Some(name) => name
                .parse()
                .map_err(|e: String| anyhow::anyhow!("Invalid default_format in config: {}", e)),
            None => Ok(OutputFormat::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.data_dir.is_none());
        assert_eq!(config.data_dir(None), PathBuf::from("data"));
        assert_eq!(config.format(None).unwrap(), OutputFormat::Table);
    }

    #[test]
    fn test_config_values_and_flag_precedence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"data_dir": "/var/lib/triage", "default_format": "json"}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.data_dir(None), PathBuf::from("/var/lib/triage"));
        assert_eq!(
            config.data_dir(Some(PathBuf::from("out"))),
            PathBuf::from("out")
        );
        assert_eq!(config.format(None).unwrap(), OutputFormat::Json);
        assert_eq!(
            config.format(Some(OutputFormat::Table)).unwrap(),
            OutputFormat::Table
        );
    }

    #[test]
    fn test_invalid_format_rejected() {
        let config = Config {
            data_dir: None,
            default_format: Some("xml".to_string()),
        };
        assert!(config.format(None).is_err());
    }
}
