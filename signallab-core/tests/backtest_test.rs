//! End-to-end backtest scenarios over hand-built price series.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use signallab_core::domain::{OrderSide, PortfolioState, PricePoint, Signal};
use signallab_core::engine::{run_backtest, run_backtest_from, BacktestConfig, StepError};
use signallab_core::strategy::combine;

fn day(i: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 6, 1)
        .unwrap()
        .and_hms_opt(16, 0, 0)
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

#[test]
fn all_cash_buy_at_single_price() {
    let (state, fill) = PortfolioState::new(1000.0).apply(Signal::Buy, 100.0);
    assert_eq!(state.position, 10);
    assert_eq!(state.cash, 0.0);
    assert_eq!(state.equity(100.0), 1000.0);
    assert_eq!(fill.unwrap().quantity, 10);
}

#[test]
fn full_liquidation_keeps_equity() {
    let start = PortfolioState {
        cash: 0.0,
        position: 10,
    };
    let (state, fill) = start.apply(Signal::Sell, 100.0);
    assert_eq!(state.position, 0);
    assert_eq!(state.cash, 1000.0);
    assert_eq!(state.equity(100.0), start.equity(100.0));
    assert_eq!(fill.unwrap().side, OrderSide::Sell);
}

#[test]
fn trending_series_buys_once_and_rides() {
    let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
    let config = BacktestConfig {
        window: 5,
        initial_cash: 10_000.0,
    };
    let result = run_backtest(&series(&closes), &config).unwrap();

    let buys: Vec<usize> = result
        .steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.fill.map(|f| f.side) == Some(OrderSide::Buy))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(buys, vec![4]);
    // Remaining buy signals find too little cash to add.
    assert!(result.signals()[5..].iter().all(|&s| s == Signal::Buy));
    assert!(result.final_equity() > 10_000.0);
    assert_eq!(result.fill_count(), 1);
}

#[test]
fn whipsaw_series_alternates_fills() {
    let closes = [100.0, 100.0, 110.0, 90.0, 110.0, 90.0];
    let config = BacktestConfig {
        window: 2,
        initial_cash: 1_000.0,
    };
    let result = run_backtest(&series(&closes), &config).unwrap();
    assert_eq!(
        result.signals(),
        vec![
            Signal::Hold,
            Signal::Hold,
            Signal::Buy,
            Signal::Sell,
            Signal::Buy,
            Signal::Sell
        ]
    );
    let sides: Vec<OrderSide> = result.fills().map(|f| f.side).collect();
    assert_eq!(
        sides,
        vec![OrderSide::Buy, OrderSide::Sell, OrderSide::Buy, OrderSide::Sell]
    );
    assert!(result.final_state.is_flat());
    assert!(result.final_state.cash < 1_000.0);
}

#[test]
fn gaps_poison_the_average_but_not_the_run() {
    let mut points = series(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
    points[2] = PricePoint::missing(points[2].timestamp);
    let config = BacktestConfig {
        window: 2,
        initial_cash: 100.0,
    };
    let result = run_backtest(&points, &config).unwrap();

    assert_eq!(result.steps.len(), 6);
    assert_eq!(result.steps[2].error, Some(StepError::MalformedPrice));
    assert_eq!(result.steps[2].average, None);
    assert_eq!(result.steps[3].average, None);
    assert_eq!(result.steps[4].average, Some(13.5));
}

#[test]
fn resume_from_existing_state() {
    let start = PortfolioState {
        cash: 50.0,
        position: 3,
    };
    let config = BacktestConfig {
        window: 1,
        initial_cash: 50.0,
    };
    let result = run_backtest_from(&series(&[20.0, 21.0]), &config, start).unwrap();
    assert_eq!(result.final_state, start);
    assert_eq!(result.final_equity(), 50.0 + 3.0 * 21.0);
}

#[test]
fn combined_signal_over_backtest_output() {
    let result = run_backtest(
        &series(&[100.0, 100.0, 100.0]),
        &BacktestConfig {
            window: 2,
            initial_cash: 1_000.0,
        },
    )
    .unwrap();
    let last = result.steps.last().unwrap();
    assert_eq!(last.signal, Signal::Hold);
    let price = last.close.unwrap();
    assert_eq!(combine(last.signal, &[Some(price + 1.0)], price), Signal::Buy);
    assert_eq!(combine(last.signal, &[Some(price - 1.0)], price), Signal::Sell);
}

#[test]
fn micro_cap_prices_cap_the_position() {
    let config = BacktestConfig {
        window: 2,
        initial_cash: 1e12,
    };
    let result = run_backtest(&series(&[1e-8, 1.1e-8, 1.2e-8, 1.3e-8]), &config).unwrap();

    assert_eq!(result.steps[1].signal, Signal::Buy);
    assert_eq!(result.steps[1].state.position, u64::MAX);
    // Repeated buys at the cap leave the ledger alone.
    assert_eq!(result.steps[3].state, result.steps[1].state);
    assert_eq!(result.final_state.position, u64::MAX);
    for step in &result.steps {
        assert!(step.state.cash >= 0.0);
        assert!(step.equity.is_finite());
    }
}
