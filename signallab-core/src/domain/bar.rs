//! Bar and PricePoint: the market data units fed to the backtest loop.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLCV record for a single timestamp, as loaded from a tabular source.
///
/// Every price column is optional: a cell that was blank or failed to parse
/// is carried as `None` instead of a sentinel value, so the row survives
/// loading and the backtest can flag it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl Bar {
    /// Bar with only a close price (open/high/low mirror the close).
    pub fn from_close(timestamp: NaiveDateTime, close: f64) -> Self {
        Self {
            timestamp,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close: Some(close),
            volume: None,
        }
    }

    /// The close price if it is a positive finite number.
    pub fn valid_close(&self) -> Option<f64> {
        self.close.filter(|c| is_valid_price(*c))
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close.
    ///
    /// Bars with any missing price column are not sane.
    pub fn is_sane(&self) -> bool {
        let (Some(open), Some(high), Some(low), Some(close)) =
            (self.open, self.high, self.low, self.close)
        else {
            return false;
        };
        is_valid_price(open)
            && is_valid_price(close)
            && high >= low
            && high >= open
            && high >= close
            && low <= open
            && low <= close
    }

    pub fn to_price_point(&self) -> PricePoint {
        PricePoint {
            timestamp: self.timestamp,
            close: self.close,
        }
    }
}

/// An ordered pair of timestamp and closing price.
///
/// `close` is `None` when the source row had no usable price. A present but
/// non-positive or non-finite close is also treated as malformed by
/// [`PricePoint::valid_close`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: NaiveDateTime,
    pub close: Option<f64>,
}

impl PricePoint {
    pub fn new(timestamp: NaiveDateTime, close: f64) -> Self {
        Self {
            timestamp,
            close: Some(close),
        }
    }

    pub fn missing(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            close: None,
        }
    }

    pub fn valid_close(&self) -> Option<f64> {
        self.close.filter(|c| is_valid_price(*c))
    }

    pub fn is_malformed(&self) -> bool {
        self.valid_close().is_none()
    }
}

/// Closing prices must be positive finite numbers.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}
