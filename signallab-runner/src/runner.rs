//! Backtest runner: wires data loading, the engine, and metrics.
//!
//! Two entry points:
//! - `run_single_backtest()`: resolves data from the config (CSV or synthetic). Used by the CLI.
//! - `run_backtest_on_data()`: takes pre-loaded data, no I/O.

use serde::{Deserialize, Serialize};
use signallab_core::domain::{PortfolioState, PricePoint};
use signallab_core::engine::{run_backtest, BacktestConfig, BacktestError, BacktestResult};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{BacktestSection, ConfigError, RunId};
use crate::data_loader::{load_bars_csv, synthetic_bars, DataSource, LoadError, LoadedData};
use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
    #[error("no data source: set backtest.data or use synthetic data")]
    NoDataSource,
}

/// Current schema version for persisted summaries.
pub const SCHEMA_VERSION: u32 = 1;

/// Where `run_single_backtest` gets its bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSpec {
    /// `backtest.data` from the config.
    Configured,
    /// Synthetic random walk of this many bars.
    Synthetic(usize),
}

/// Serializable summary of one run (`summary.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub symbol: String,
    pub source: DataSource,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub malformed_rows: usize,
    pub config: BacktestConfig,
    pub metrics: PerformanceMetrics,
    pub final_state: PortfolioState,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// A finished run: the summary plus the full per-step result.
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub summary: RunSummary,
    pub result: BacktestResult,
}

/// Deterministic run id: BLAKE3 over the symbol, config JSON, and dataset hash.
pub fn run_id(symbol: &str, config: &BacktestConfig, dataset_hash: &str) -> RunId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    // Plain numeric struct; serialization cannot fail.
    if let Ok(json) = serde_json::to_string(config) {
        hasher.update(json.as_bytes());
    }
    hasher.update(dataset_hash.as_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..16].to_string()
}

/// Resolve data for `section` and run.
pub fn run_single_backtest(
    section: &BacktestSection,
    data: &DataSpec,
) -> Result<BacktestRun, RunError> {
    let loaded = match data {
        DataSpec::Synthetic(n) => {
            warn!(symbol = %section.symbol, bars = n, "using synthetic data");
            synthetic_bars(&section.symbol, *n)
        }
        DataSpec::Configured => {
            let path = section.data.as_ref().ok_or(RunError::NoDataSource)?;
            load_bars_csv(path)?
        }
    };
    run_backtest_on_data(&section.symbol, &loaded, &section.engine_config())
}

/// Run a backtest with pre-loaded data.
pub fn run_backtest_on_data(
    symbol: &str,
    loaded: &LoadedData,
    config: &BacktestConfig,
) -> Result<BacktestRun, RunError> {
    let points: Vec<PricePoint> = loaded.bars.iter().map(|b| b.to_price_point()).collect();
    let result = run_backtest(&points, config)?;

    for (i, step) in result.flagged_steps() {
        warn!(index = i, timestamp = %step.timestamp, "malformed price; step held");
    }

    let metrics = PerformanceMetrics::compute(&result);
    let summary = RunSummary {
        schema_version: SCHEMA_VERSION,
        run_id: run_id(symbol, config, &loaded.dataset_hash),
        symbol: symbol.to_string(),
        source: loaded.source,
        dataset_hash: loaded.dataset_hash.clone(),
        bar_count: points.len(),
        malformed_rows: loaded.malformed_rows,
        config: *config,
        metrics,
        final_state: result.final_state,
    };

    info!(
        run_id = %summary.run_id,
        symbol,
        bars = summary.bar_count,
        fills = summary.metrics.trade_count,
        final_equity = summary.metrics.final_equity,
        "backtest complete"
    );

    Ok(BacktestRun { summary, result })
}
