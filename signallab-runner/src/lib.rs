//! SignalLab Runner: configuration, data loading, backtest orchestration,
//! metrics, export, and the live polling loop.
//!
//! This crate builds on `signallab-core` to provide:
//! - TOML application config
//! - CSV loading with a synthetic fallback
//! - Single-backtest runner with metrics and artifact export
//! - Combined SMA/model advice for the latest bar
//! - Live loop over a price feed and an order gateway

pub mod advice;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod live;
pub mod metrics;
pub mod runner;

pub use advice::{evaluate_latest, Advice, AdviceError, Prediction};
pub use config::{AppConfig, BacktestSection, ConfigError, LiveSection, LogFormat, RunId};
pub use data_loader::{load_bars_csv, read_bars, synthetic_bars, DataSource, LoadError, LoadedData};
pub use export::{save_artifacts, write_bars_csv, write_features_csv, ExportError};
pub use live::{run_cycle, run_live, CycleOutcome, LiveConfig, LiveSummary, TradeLog, TradeLogEntry};
pub use metrics::PerformanceMetrics;
pub use runner::{
    run_backtest_on_data, run_single_backtest, BacktestRun, DataSpec, RunError, RunSummary,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn run_types_are_send_sync() {
        assert_send::<RunSummary>();
        assert_sync::<RunSummary>();
        assert_send::<BacktestRun>();
        assert_sync::<BacktestRun>();
        assert_send::<AppConfig>();
        assert_sync::<AppConfig>();
        assert_send::<TradeLog>();
        assert_sync::<TradeLog>();
    }
}
