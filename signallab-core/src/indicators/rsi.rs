//! Relative Strength Index (RSI), simple-average variant.
//!
//! Average gain and average loss are plain rolling means over `period`
//! price changes (no Wilder smoothing).
//! RSI = 100 - 100 / (1 + avg_gain / (avg_loss + 1e-9))
//! Lookback: period (the first change needs a previous close).
//! Edge cases: no losses in the window → RSI ≈ 100; no gains → RSI = 0.

use super::sma::RollingMeanExt;
use super::{Indicator, IndicatorError};

/// Added to the loss average so a loss-free window does not divide by zero.
const LOSS_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::InvalidWindow {
                name: "rsi",
                window: period,
            });
        }
        Ok(Self {
            period,
            name: format!("rsi_{period}"),
        })
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        let changes: Vec<Option<f64>> = std::iter::once(None)
            .chain(values.windows(2).map(|w| Some(w[1]? - w[0]?)))
            .take(values.len())
            .collect();

        let gains = changes.iter().map(|c| c.map(|d| d.max(0.0)));
        let losses = changes.iter().map(|c| c.map(|d| (-d).max(0.0)));

        let (Ok(avg_gain), Ok(avg_loss)) = (
            gains.rolling_mean(self.period),
            losses.rolling_mean(self.period),
        ) else {
            return vec![None; values.len()];
        };

        avg_gain
            .zip(avg_loss)
            .map(|(gain, loss)| {
                let rs = gain? / (loss? + LOSS_EPSILON);
                Some(100.0 - 100.0 / (1.0 + rs))
            })
            .collect()
    }
}
