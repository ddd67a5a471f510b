//! Market data provider traits and their error type.
//!
//! `HistoryProvider` serves daily bars for a date range; `PriceFeed` serves
//! the latest price for the live loop. Both are implemented by the Yahoo
//! provider and mocked in tests.

use crate::domain::Bar;
use chrono::NaiveDate;
use thiserror::Error;

/// Structured errors for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no data returned for '{symbol}'")]
    NoData { symbol: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

/// Source of historical daily bars.
pub trait HistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Daily bars for `symbol` between `start` and `end` inclusive, ascending.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Bar>, DataError>;

    /// False while the provider is refusing requests.
    fn is_available(&self) -> bool;
}

/// Source of the most recent traded price.
pub trait PriceFeed {
    fn latest_price(&self, symbol: &str) -> Result<f64, DataError>;
}

/// Last valid close in `bars`, or `NoData`.
pub fn last_valid_close(symbol: &str, bars: &[Bar]) -> Result<f64, DataError> {
    bars.iter()
        .rev()
        .find_map(Bar::valid_close)
        .ok_or_else(|| DataError::NoData {
            symbol: symbol.to_string(),
        })
}
