//! Domain types for SignalLab

pub mod bar;
pub mod order;
pub mod portfolio;
pub mod signal;

pub use bar::{is_valid_price, Bar, PricePoint};
pub use order::{OrderConfirmation, OrderRequest, OrderSide, OrderType, TimeInForce};
pub use portfolio::{LedgerFill, PortfolioState};
pub use signal::{decide, decide_raw, ParseSignalError, Signal};

