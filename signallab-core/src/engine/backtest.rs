//! Backtest loop: a sequential fold of [`PortfolioState`] over a price series.
//!
//! Per step:
//! 1. Rolling average at this step (lazy, computed alongside the fold)
//! 2. `decide(close, average)`
//! 3. Apply the signal to the ledger (buy-all-affordable / sell-all-held)
//! 4. Record equity
//!
//! Malformed closes never abort the run: the step holds, carries the prior
//! state forward, and is flagged.

use crate::domain::{decide, PortfolioState, PricePoint, Signal};
use crate::indicators::{IndicatorError, RollingMeanExt};
use thiserror::Error;

use super::state::{BacktestConfig, BacktestResult, BacktestStep, StepError};

/// Structural problems that make a run impossible.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("price series is empty")]
    EmptySeries,

    #[error("timestamps not strictly ascending at index {index} ({previous} >= {current})")]
    Unordered {
        index: usize,
        previous: chrono::NaiveDateTime,
        current: chrono::NaiveDateTime,
    },

    #[error("initial cash must be finite and non-negative, got {0}")]
    InvalidInitialCash(f64),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),
}

/// Run a backtest from a fresh all-cash state.
pub fn run_backtest(
    points: &[PricePoint],
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    if !config.initial_cash.is_finite() || config.initial_cash < 0.0 {
        return Err(BacktestError::InvalidInitialCash(config.initial_cash));
    }
    run_backtest_from(points, config, PortfolioState::new(config.initial_cash))
}

/// Run a backtest starting from an existing ledger state.
///
/// `config.initial_cash` is recorded on the result but the fold starts from
/// `initial`.
pub fn run_backtest_from(
    points: &[PricePoint],
    config: &BacktestConfig,
    initial: PortfolioState,
) -> Result<BacktestResult, BacktestError> {
    validate_series(points)?;
    if !initial.cash.is_finite() || initial.cash < 0.0 {
        return Err(BacktestError::InvalidInitialCash(initial.cash));
    }

    let averages = points
        .iter()
        .map(PricePoint::valid_close)
        .rolling_mean(config.window)?;

    let mut steps = Vec::with_capacity(points.len());
    let mut state = initial;
    let mut last_mark: Option<f64> = None;

    for (point, average) in points.iter().zip(averages) {
        let step = match point.valid_close() {
            Some(price) => {
                let signal = decide(Some(price), average);
                let (next, fill) = state.apply(signal, price);
                state = next;
                last_mark = Some(price);
                BacktestStep {
                    timestamp: point.timestamp,
                    close: point.close,
                    average,
                    signal,
                    fill,
                    state,
                    equity: state.equity(price),
                    error: None,
                }
            }
            None => BacktestStep {
                timestamp: point.timestamp,
                close: point.close,
                average,
                signal: Signal::Hold,
                fill: None,
                state,
                equity: last_mark.map_or(state.cash, |mark| state.equity(mark)),
                error: Some(StepError::MalformedPrice),
            },
        };
        steps.push(step);
    }

    Ok(BacktestResult {
        config: *config,
        steps,
        final_state: state,
    })
}

/// Non-empty and strictly ascending by timestamp.
pub fn validate_series(points: &[PricePoint]) -> Result<(), BacktestError> {
    if points.is_empty() {
        return Err(BacktestError::EmptySeries);
    }
    for (i, pair) in points.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(BacktestError::Unordered {
                index: i + 1,
                previous: pair[0].timestamp,
                current: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn day(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(i)
    }

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(day(i as i64), c))
            .collect()
    }

    fn config(window: usize, cash: f64) -> BacktestConfig {
        BacktestConfig {
            window,
            initial_cash: cash,
        }
    }

    #[test]
    fn window_one_always_holds() {
        // Window 1: the average equals the price, so the rule holds.
        let result = run_backtest(&series(&[100.0]), &config(1, 1000.0)).unwrap();
        assert_eq!(result.steps[0].signal, Signal::Hold);
        assert_eq!(result.final_state, PortfolioState::new(1000.0));
    }

    #[test]
    fn buy_then_sell_round_trip() {
        // window 2: avg[1]=100.5 (buy at 101), avg[2]=100.5 (sell at 100)
        let result = run_backtest(&series(&[100.0, 101.0, 100.0]), &config(2, 1000.0)).unwrap();
        let signals = result.signals();
        assert_eq!(signals, vec![Signal::Hold, Signal::Buy, Signal::Sell]);

        let buy = result.steps[1].fill.unwrap();
        assert_eq!(buy.side, OrderSide::Buy);
        assert_eq!(buy.quantity, 9);
        assert_eq!(result.steps[1].state.position, 9);
        assert!((result.steps[1].equity - 1000.0).abs() < 1e-9);

        let sell = result.steps[2].fill.unwrap();
        assert_eq!(sell.side, OrderSide::Sell);
        assert_eq!(sell.quantity, 9);
        assert_eq!(result.final_state.position, 0);
        assert!((result.final_state.cash - 991.0).abs() < 1e-9);
        assert_eq!(result.fill_count(), 2);
    }

    #[test]
    fn warmup_steps_hold_and_keep_cash() {
        let result = run_backtest(&series(&[10.0, 20.0, 30.0]), &config(3, 500.0)).unwrap();
        assert_eq!(result.steps[0].average, None);
        assert_eq!(result.steps[1].average, None);
        assert_eq!(result.steps[2].average, Some(20.0));
        assert_eq!(result.steps[0].equity, 500.0);
        assert_eq!(result.steps[1].equity, 500.0);
    }

    #[test]
    fn sell_from_existing_position() {
        let start = PortfolioState {
            cash: 0.0,
            position: 10,
        };
        // window 2 over [110, 100]: avg[1] = 105 > 100 → SELL
        let result =
            run_backtest_from(&series(&[110.0, 100.0]), &config(2, 0.0), start).unwrap();
        let step = &result.steps[1];
        assert_eq!(step.signal, Signal::Sell);
        assert_eq!(step.state.position, 0);
        assert_eq!(step.state.cash, 1000.0);
        assert_eq!(step.equity, 1000.0);
    }

    #[test]
    fn malformed_row_is_flagged_and_carried_forward() {
        let mut points = series(&[100.0, 101.0, 102.0, 103.0]);
        points[2].close = None;
        let result = run_backtest(&points, &config(1, 1000.0)).unwrap();

        let flagged: Vec<usize> = result.flagged_steps().map(|(i, _)| i).collect();
        assert_eq!(flagged, vec![2]);
        let bad = &result.steps[2];
        assert_eq!(bad.signal, Signal::Hold);
        assert_eq!(bad.state, result.steps[1].state);
        assert_eq!(bad.equity, result.steps[1].equity);
        assert_eq!(bad.error, Some(StepError::MalformedPrice));
        assert_eq!(result.malformed_count(), 1);
    }

    #[test]
    fn malformed_first_row_equity_is_cash() {
        let mut points = series(&[100.0, 101.0]);
        points[0].close = Some(f64::NAN);
        let result = run_backtest(&points, &config(1, 250.0)).unwrap();
        assert_eq!(result.steps[0].equity, 250.0);
        assert_eq!(result.steps[0].error, Some(StepError::MalformedPrice));
    }

    #[test]
    fn marks_held_position_at_last_valid_close() {
        let start = PortfolioState {
            cash: 5.0,
            position: 2,
        };
        let mut points = series(&[50.0, 60.0]);
        points[1].close = Some(-1.0);
        let result = run_backtest_from(&points, &config(5, 5.0), start).unwrap();
        assert_eq!(result.steps[1].equity, 5.0 + 2.0 * 50.0);
    }

    #[test]
    fn empty_series_is_fatal() {
        assert_eq!(
            run_backtest(&[], &config(3, 100.0)),
            Err(BacktestError::EmptySeries)
        );
    }

    #[test]
    fn unordered_series_is_fatal() {
        let mut points = series(&[1.0, 2.0, 3.0]);
        points.swap(1, 2);
        match run_backtest(&points, &config(1, 100.0)) {
            Err(BacktestError::Unordered { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected Unordered, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_timestamps_are_fatal() {
        let mut points = series(&[1.0, 2.0]);
        points[1].timestamp = points[0].timestamp;
        assert!(matches!(
            run_backtest(&points, &config(1, 100.0)),
            Err(BacktestError::Unordered { index: 1, .. })
        ));
    }

    #[test]
    fn invalid_window_and_cash_are_fatal() {
        let points = series(&[1.0]);
        assert!(matches!(
            run_backtest(&points, &config(0, 100.0)),
            Err(BacktestError::Indicator(_))
        ));
        assert!(matches!(
            run_backtest(&points, &config(1, -1.0)),
            Err(BacktestError::InvalidInitialCash(_))
        ));
        assert!(matches!(
            run_backtest(&points, &config(1, f64::INFINITY)),
            Err(BacktestError::InvalidInitialCash(_))
        ));
    }

    #[test]
    fn deterministic_across_runs() {
        let points = series(&[10.0, 12.0, 11.0, 9.0, 13.0, 14.0, 8.0]);
        let a = run_backtest(&points, &config(3, 1000.0)).unwrap();
        let b = run_backtest(&points, &config(3, 1000.0)).unwrap();
        assert_eq!(a, b);
    }
}
