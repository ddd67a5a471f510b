//! Backtesting engine: replays the decision rule over a price series while
//! folding a cash/position ledger.

pub mod backtest;
pub mod state;

pub use backtest::{run_backtest, run_backtest_from, validate_series, BacktestError};
pub use state::{BacktestConfig, BacktestResult, BacktestStep, StepError};
