//! Feature preparation for model training and inference.
//!
//! Turns raw OHLCV bars into rows of engineered features: one-period return,
//! three moving averages, RSI, realised volatility, and the next-bar return
//! as the training target. Rows where any column is undefined (warmup, gaps,
//! the final bar) are dropped.

use crate::domain::Bar;
use crate::indicators::{forward_return, pct_change, Indicator, RollingStd, Rsi, Sma};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Model input column order.
pub const FEATURE_NAMES: [&str; 11] = [
    "close",
    "high",
    "low",
    "open",
    "volume",
    "return",
    "ma_5",
    "ma_20",
    "ma_50",
    "rsi_14",
    "volatility_10",
];

/// One fully-populated feature row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(rename = "return")]
    pub ret: f64,
    pub ma_5: f64,
    pub ma_20: f64,
    pub ma_50: f64,
    pub rsi_14: f64,
    pub volatility_10: f64,
    pub future_return: f64,
}

impl FeatureRow {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn feature_vector(&self) -> Vec<f64> {
        vec![
            self.close,
            self.high,
            self.low,
            self.open,
            self.volume,
            self.ret,
            self.ma_5,
            self.ma_20,
            self.ma_50,
            self.rsi_14,
            self.volatility_10,
        ]
    }
}

/// Compute feature rows from bars. Bars are sorted by timestamp first.
pub fn prepare_features(bars: &[Bar]) -> Vec<FeatureRow> {
    let mut sorted = bars.to_vec();
    sorted.sort_by_key(|b| b.timestamp);

    let closes: Vec<Option<f64>> = sorted.iter().map(Bar::valid_close).collect();
    let returns = pct_change(&closes);
    let future = forward_return(&closes);

    // Periods are non-zero constants, so construction cannot fail.
    let ma_5 = compute(Sma::new(5).ok(), &closes);
    let ma_20 = compute(Sma::new(20).ok(), &closes);
    let ma_50 = compute(Sma::new(50).ok(), &closes);
    let rsi_14 = compute(Rsi::new(14).ok(), &closes);
    let volatility_10 = compute(RollingStd::new(10).ok(), &returns);

    sorted
        .iter()
        .enumerate()
        .filter_map(|(i, bar)| {
            Some(FeatureRow {
                timestamp: bar.timestamp,
                open: bar.open?,
                high: bar.high?,
                low: bar.low?,
                close: closes[i]?,
                volume: bar.volume? as f64,
                ret: returns[i]?,
                ma_5: ma_5[i]?,
                ma_20: ma_20[i]?,
                ma_50: ma_50[i]?,
                rsi_14: rsi_14[i]?,
                volatility_10: volatility_10[i]?,
                future_return: future[i]?,
            })
        })
        .collect()
}

fn compute<I: Indicator>(indicator: Option<I>, values: &[Option<f64>]) -> Vec<Option<f64>> {
    indicator.map_or_else(|| vec![None; values.len()], |ind| ind.compute(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bars(n: usize) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1;
                Bar {
                    timestamp: base + Duration::days(i as i64),
                    open: Some(close - 0.5),
                    high: Some(close + 1.0),
                    low: Some(close - 1.0),
                    close: Some(close),
                    volume: Some(1_000 + i as u64),
                }
            })
            .collect()
    }

    #[test]
    fn drops_warmup_and_last_row() {
        let rows = prepare_features(&bars(60));
        // ma_50 first defined at index 49; the last bar has no future return.
        assert_eq!(rows.len(), 60 - 49 - 1);
        let first = &rows[0];
        let expected_ts = bars(60)[49].timestamp;
        assert_eq!(first.timestamp, expected_ts);
    }

    #[test]
    fn too_short_series_yields_nothing() {
        assert!(prepare_features(&bars(30)).is_empty());
    }

    #[test]
    fn sorts_before_computing() {
        let mut shuffled = bars(60);
        shuffled.reverse();
        assert_eq!(prepare_features(&shuffled), prepare_features(&bars(60)));
    }

    #[test]
    fn future_return_matches_next_close() {
        let input = bars(55);
        let rows = prepare_features(&input);
        let row = &rows[0];
        let next_close = input[50].close.unwrap();
        assert!((row.future_return - (next_close / row.close - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn missing_close_drops_affected_rows() {
        let mut input = bars(60);
        input[55].close = None;
        let rows = prepare_features(&input);
        assert!(rows
            .iter()
            .all(|r| r.timestamp < input[54].timestamp));
    }

    #[test]
    fn feature_vector_follows_names() {
        let rows = prepare_features(&bars(60));
        let v = rows[0].feature_vector();
        assert_eq!(v.len(), FEATURE_NAMES.len());
        assert_eq!(v[0], rows[0].close);
        assert_eq!(v[5], rows[0].ret);
        assert_eq!(v[10], rows[0].volatility_10);
    }
}
