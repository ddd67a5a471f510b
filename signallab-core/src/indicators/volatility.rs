//! Rolling sample standard deviation.
//!
//! Applied to one-period returns this is the realised volatility feature.
//! Uses the n-1 denominator. Lookback: period - 1.

use super::{Indicator, IndicatorError};

#[derive(Debug, Clone)]
pub struct RollingStd {
    period: usize,
    name: String,
}

impl RollingStd {
    /// `period` must be at least 2 for a sample deviation to exist.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period < 2 {
            return Err(IndicatorError::InvalidWindow {
                name: "volatility",
                window: period,
            });
        }
        Ok(Self {
            period,
            name: format!("volatility_{period}"),
        })
    }
}

impl Indicator for RollingStd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut result = vec![None; values.len()];
        for (i, slot) in result.iter_mut().enumerate().skip(self.period - 1) {
            let window = &values[i + 1 - self.period..=i];
            *slot = sample_std(window);
        }
        result
    }
}

fn sample_std(window: &[Option<f64>]) -> Option<f64> {
    let values: Vec<f64> = window
        .iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect::<Option<_>>()?;
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}
