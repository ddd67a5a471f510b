//! Application configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! Command-line flags override individual values after loading.

use serde::{Deserialize, Serialize};
use signallab_core::engine::BacktestConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub backtest: BacktestSection,
    pub live: LiveSection,
    pub logging: LoggingSection,
}

/// Where `signallab download AAPL` writes by default.
pub const DEFAULT_DATA_PATH: &str = "data/AAPL_daily.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestSection {
    pub symbol: String,
    /// CSV with at least `timestamp`/`date` and `close` columns.
    pub data: Option<PathBuf>,
    pub window: usize,
    pub initial_cash: f64,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            symbol: "AAPL".into(),
            data: Some(PathBuf::from(DEFAULT_DATA_PATH)),
            window: 20,
            initial_cash: 10_000.0,
        }
    }
}

impl BacktestSection {
    pub fn engine_config(&self) -> BacktestConfig {
        BacktestConfig {
            window: self.window,
            initial_cash: self.initial_cash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveSection {
    pub symbol: String,
    /// Fixed reference average the live price is compared against.
    pub moving_average: f64,
    pub quantity: u64,
    pub interval_secs: u64,
    /// Stop after this many cycles; 0 runs until interrupted.
    pub max_cycles: u64,
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            symbol: "AAPL".into(),
            moving_average: 150.0,
            quantity: 1,
            interval_secs: 60,
            max_cycles: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Read and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if bt.window == 0 {
            return Err(ConfigError::Invalid("backtest.window must be >= 1".into()));
        }
        if !bt.initial_cash.is_finite() || bt.initial_cash <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "backtest.initial_cash must be positive, got {}",
                bt.initial_cash
            )));
        }
        let live = &self.live;
        if live.quantity == 0 {
            return Err(ConfigError::Invalid("live.quantity must be >= 1".into()));
        }
        if !live.moving_average.is_finite() || live.moving_average <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "live.moving_average must be positive, got {}",
                live.moving_average
            )));
        }
        if bt.symbol.trim().is_empty() || live.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".into()));
        }
        Ok(())
    }
}
