//! Market data providers.

pub mod circuit_breaker;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use provider::{last_valid_close, DataError, HistoryProvider, PriceFeed};
pub use yahoo::YahooProvider;
