//! Indicator implementations over optional value series.
//!
//! Every indicator maps a series of `Option<f64>` to a series of the same
//! length. Warmup positions and any window touching a missing value are
//! `None`. No value at index `t` depends on data after `t`, with the single
//! exception of [`returns::forward_return`], which is a label and not an
//! indicator.

pub mod returns;
pub mod rsi;
pub mod sma;
pub mod volatility;

pub use returns::{forward_return, pct_change};
pub use rsi::Rsi;
pub use sma::{sma, RollingMean, RollingMeanExt, Sma};
pub use volatility::RollingStd;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("invalid {name} window {window}")]
    InvalidWindow { name: &'static str, window: usize },
}

/// Trait for indicators.
///
/// Indicators take a full value series and produce an output series of the
/// same length. The first `lookback()` values are `None` (warmup).
pub trait Indicator: Send + Sync {
    /// Column name (e.g., "ma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Number of leading values that are always undefined.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire series.
    fn compute(&self, values: &[Option<f64>]) -> Vec<Option<f64>>;
}

/// Wrap plain values as present optional values.
#[cfg(test)]
pub fn some(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
