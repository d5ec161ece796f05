//! Research configuration, read from TOML.
//!
//! Every field is optional; missing values fall back to the defaults below.
//!
//! ```toml
//! data_dir = "data"
//!
//! [universe]
//! start_date = "2020-01-01"
//! tickers = ["AAPL", "MSFT", "GOOGL", "AMZN", "META"]
//!
//! [download]
//! base_delay_ms = 300
//! max_retries = 3
//! ```

use crate::data::{DownloadOptions, Universe};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Root of the monthly period files.
    pub data_dir: PathBuf,
    pub universe: Universe,
    pub download: DownloadConfig,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            universe: Universe::default_research(),
            download: DownloadConfig::default(),
        }
    }
}

impl ResearchConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub base_delay_ms: u64,
    pub max_retries: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 300,
            max_retries: 3,
        }
    }
}

impl DownloadConfig {
    pub fn to_options(&self) -> DownloadOptions {
        DownloadOptions {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_retries: self.max_retries,
            filter_dates: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = ResearchConfig::from_toml("").unwrap();
        assert_eq!(cfg, ResearchConfig::default());
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.universe.len(), 5);
    }

    #[test]
    fn partial_sections_override_fields() {
        let cfg = ResearchConfig::from_toml(
            r#"
data_dir = "/srv/prices"

[universe]
tickers = ["SPY"]

[download]
max_retries = 5
"#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/prices"));
        assert_eq!(cfg.universe.tickers(), ["SPY"]);
        assert_eq!(cfg.universe.start_date.to_string(), "2020-01-01");
        assert_eq!(cfg.download.max_retries, 5);
        assert_eq!(cfg.download.base_delay_ms, 300);

        let opts = cfg.download.to_options();
        assert_eq!(opts.base_delay, Duration::from_millis(300));
        assert_eq!(opts.max_retries, 5);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(ResearchConfig::from_toml("data_dir = 3").is_err());
    }
}
