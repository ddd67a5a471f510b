//! Simple Moving Average (SMA).
//!
//! Rolling arithmetic mean over a trailing window. Element `i` is defined
//! once `i >= window - 1` and every value in the window is present.
//! Lookback: window - 1.

use super::{Indicator, IndicatorError};
use std::collections::VecDeque;

/// Lazy rolling mean over a stream of optional values.
///
/// Yields exactly one item per input item. A missing or non-finite input
/// makes every window containing it undefined.
#[derive(Debug, Clone)]
pub struct RollingMean<I> {
    inner: I,
    window: usize,
    buf: VecDeque<Option<f64>>,
}

impl<I> RollingMean<I>
where
    I: Iterator<Item = Option<f64>>,
{
    pub fn new(inner: I, window: usize) -> Result<Self, IndicatorError> {
        if window == 0 {
            return Err(IndicatorError::InvalidWindow {
                name: "sma",
                window,
            });
        }
        Ok(Self {
            inner,
            window,
            buf: VecDeque::with_capacity(window),
        })
    }

    fn current(&self) -> Option<f64> {
        if self.buf.len() < self.window {
            return None;
        }
        // Summed from the buffer each step so the result is the plain mean
        // of the window, with no drift from add/subtract updates.
        let mut sum = 0.0;
        for value in &self.buf {
            sum += (*value)?;
        }
        Some(sum / self.window as f64)
    }
}

impl<I> Iterator for RollingMean<I>
where
    I: Iterator<Item = Option<f64>>,
{
    type Item = Option<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.inner.next()?;
        if self.buf.len() == self.window {
            self.buf.pop_front();
        }
        self.buf.push_back(value.filter(|v| v.is_finite()));
        Some(self.current())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<I> ExactSizeIterator for RollingMean<I> where I: ExactSizeIterator<Item = Option<f64>> {}

/// Adapter so any `Option<f64>` iterator can call `.rolling_mean(window)`.
pub trait RollingMeanExt: Iterator<Item = Option<f64>> + Sized {
    fn rolling_mean(self, window: usize) -> Result<RollingMean<Self>, IndicatorError> {
        RollingMean::new(self, window)
    }
}

impl<I> RollingMeanExt for I where I: Iterator<Item = Option<f64>> {}

/// Eager rolling mean over a slice.
pub fn sma(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    Ok(values.iter().copied().rolling_mean(window)?.collect())
}

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::InvalidWindow {
                name: "sma",
                window: period,
            });
        }
        Ok(Self {
            period,
            name: format!("ma_{period}"),
        })
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        values
            .iter()
            .copied()
            .rolling_mean(self.period)
            .map(|it| it.collect())
            .unwrap_or_else(|_| vec![None; values.len()])
    }
}
