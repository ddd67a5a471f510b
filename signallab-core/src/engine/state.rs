//! Backtest configuration, per-step records, and the run result.

use crate::domain::{LedgerFill, PortfolioState, Signal};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Configuration for a single backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Rolling-average window (>= 1).
    pub window: usize,
    /// Starting cash (finite, >= 0).
    pub initial_cash: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            window: 20,
            initial_cash: 10_000.0,
        }
    }
}

/// Non-fatal problem with a single step. The step held its prior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepError {
    /// Close price missing, non-numeric, non-finite, or non-positive.
    MalformedPrice,
}

impl StepError {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepError::MalformedPrice => "malformed_price",
        }
    }
}

/// One row of the augmented output series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestStep {
    pub timestamp: NaiveDateTime,
    /// Close as given in the input (may be malformed).
    pub close: Option<f64>,
    /// Rolling average ending at this step, if defined.
    pub average: Option<f64>,
    pub signal: Signal,
    /// Ledger change made at this step.
    pub fill: Option<LedgerFill>,
    /// State after the step.
    pub state: PortfolioState,
    /// `cash + position * mark`, marked at this close or the last valid one.
    pub equity: f64,
    pub error: Option<StepError>,
}

/// Result of a complete backtest run. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub steps: Vec<BacktestStep>,
    pub final_state: PortfolioState,
}

impl BacktestResult {
    /// Equity value at each step.
    pub fn equity_curve(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.equity).collect()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.steps.iter().map(|s| s.signal).collect()
    }

    pub fn fills(&self) -> impl Iterator<Item = &LedgerFill> {
        self.steps.iter().filter_map(|s| s.fill.as_ref())
    }

    pub fn fill_count(&self) -> usize {
        self.fills().count()
    }

    /// Steps flagged with a [`StepError`].
    pub fn flagged_steps(&self) -> impl Iterator<Item = (usize, &BacktestStep)> {
        self.steps.iter().enumerate().filter(|(_, s)| s.error.is_some())
    }

    pub fn malformed_count(&self) -> usize {
        self.flagged_steps().count()
    }

    /// Equity at the last step. Runs always have at least one step.
    pub fn final_equity(&self) -> f64 {
        self.steps
            .last()
            .map_or(self.config.initial_cash, |s| s.equity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = BacktestConfig::default();
        assert_eq!(config.window, 20);
        assert_eq!(config.initial_cash, 10_000.0);
    }

    #[test]
    fn step_error_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StepError::MalformedPrice).unwrap(),
            "\"malformed_price\""
        );
        assert_eq!(StepError::MalformedPrice.as_str(), "malformed_price");
    }
}
