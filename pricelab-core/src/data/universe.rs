//! Universe configuration: the ordered ticker list under research coverage.
//!
//! Stored as TOML next to the start date used for fresh downloads:
//!
//! ```toml
//! start_date = "2020-01-01"
//! tickers = ["AAPL", "MSFT"]
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// The complete universe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    /// First date fetched for tickers with nothing stored yet.
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    pub tickers: Vec<String>,
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
}

impl Default for Universe {
    fn default() -> Self {
        Self::default_research()
    }
}

impl Universe {
    pub fn new(tickers: Vec<String>, start_date: NaiveDate) -> Self {
        Self { start_date, tickers }
    }

    /// The five large-cap names covered by default, from 2020-01-01.
    pub fn default_research() -> Self {
        Self {
            start_date: default_start_date(),
            tickers: ["AAPL", "MSFT", "GOOGL", "AMZN", "META"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize the universe to TOML.
    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t == ticker)
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_universe_keeps_order() {
        let u = Universe::default_research();
        assert_eq!(u.tickers(), ["AAPL", "MSFT", "GOOGL", "AMZN", "META"]);
        assert_eq!(u.start_date.to_string(), "2020-01-01");
        assert!(u.contains("META"));
        assert!(!u.contains("SPY"));
    }

    #[test]
    fn toml_roundtrip() {
        let u = Universe::default_research();
        let toml_str = u.to_toml().unwrap();
        let parsed = Universe::from_toml(&toml_str).unwrap();
        assert_eq!(u, parsed);
    }

    #[test]
    fn start_date_defaults_when_absent() {
        let u = Universe::from_toml(r#"tickers = ["SPY", "QQQ"]"#).unwrap();
        assert_eq!(u.len(), 2);
        assert_eq!(u.start_date.to_string(), "2020-01-01");
    }

    #[test]
    fn tickers_are_required() {
        assert!(Universe::from_toml(r#"start_date = "2020-01-01""#).is_err());
    }
}
