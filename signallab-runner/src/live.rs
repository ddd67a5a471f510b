//! Live polling loop.
//!
//! Each cycle fetches the latest price, compares it to a fixed reference
//! average, and on BUY/SELL submits a market order of fixed size. Feed
//! errors skip the cycle; gateway errors are logged and the loop goes on.

use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use signallab_core::broker::{BrokerError, OrderGateway};
use signallab_core::data::PriceFeed;
use signallab_core::domain::{decide, OrderConfirmation, OrderRequest, OrderSide, Signal};
use tracing::{error, info, warn};

use crate::config::LiveSection;
use crate::export::ExportError;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub symbol: String,
    pub moving_average: f64,
    pub quantity: u64,
    pub interval: Duration,
    /// `None` runs until the process is stopped.
    pub max_cycles: Option<u64>,
}

impl From<&LiveSection> for LiveConfig {
    fn from(section: &LiveSection) -> Self {
        Self {
            symbol: section.symbol.clone(),
            moving_average: section.moving_average,
            quantity: section.quantity,
            interval: Duration::from_secs(section.interval_secs),
            max_cycles: (section.max_cycles > 0).then_some(section.max_cycles),
        }
    }
}

/// One submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub timestamp: NaiveDateTime,
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
}

impl TradeLogEntry {
    /// Mark-to-market P/L of this entry at `current_price`.
    pub fn pnl(&self, current_price: f64) -> f64 {
        let qty = self.quantity as f64;
        match self.side {
            OrderSide::Buy => (current_price - self.price) * qty,
            OrderSide::Sell => (self.price - current_price) * qty,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeLog {
    entries: Vec<TradeLogEntry>,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: TradeLogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TradeLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summed P/L of every entry marked at `current_price`.
    pub fn pnl(&self, current_price: f64) -> f64 {
        self.entries.iter().map(|e| e.pnl(current_price)).sum()
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), ExportError> {
        let mut wtr = csv::Writer::from_path(path)?;
        for entry in &self.entries {
            wtr.serialize(entry)?;
        }
        wtr.flush().map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

/// What happened in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No usable price this cycle.
    Skipped { reason: String },
    Held { price: f64 },
    Submitted {
        signal: Signal,
        price: f64,
        confirmation: OrderConfirmation,
    },
    Rejected {
        signal: Signal,
        price: f64,
        error: BrokerError,
    },
}

/// Run a single poll-decide-submit step.
pub fn run_cycle<F, G>(
    config: &LiveConfig,
    feed: &F,
    gateway: &mut G,
    log: &mut TradeLog,
) -> CycleOutcome
where
    F: PriceFeed + ?Sized,
    G: OrderGateway + ?Sized,
{
    let price = match feed.latest_price(&config.symbol) {
        Ok(p) if p.is_finite() && p > 0.0 => p,
        Ok(p) => {
            warn!(symbol = %config.symbol, price = p, "feed returned an unusable price");
            return CycleOutcome::Skipped {
                reason: format!("unusable price {p}"),
            };
        }
        Err(e) => {
            warn!(symbol = %config.symbol, error = %e, "price fetch failed; skipping cycle");
            return CycleOutcome::Skipped {
                reason: e.to_string(),
            };
        }
    };
    gateway.observe_price(&config.symbol, price);

    let signal = decide(Some(price), Some(config.moving_average));
    info!(
        symbol = %config.symbol,
        price,
        average = config.moving_average,
        %signal,
        "decision"
    );

    let Some(side) = OrderSide::from_signal(signal) else {
        return CycleOutcome::Held { price };
    };

    let order = OrderRequest::market(config.symbol.clone(), config.quantity, side);
    match gateway.submit(&order) {
        Ok(confirmation) => {
            log.record(TradeLogEntry {
                timestamp: Utc::now().naive_utc(),
                order_id: confirmation.order_id.clone(),
                symbol: config.symbol.clone(),
                side,
                quantity: config.quantity,
                price,
            });
            CycleOutcome::Submitted {
                signal,
                price,
                confirmation,
            }
        }
        Err(e) => {
            error!(symbol = %config.symbol, %signal, error = %e, "order submission failed");
            CycleOutcome::Rejected {
                signal,
                price,
                error: e,
            }
        }
    }
}

/// Cycle counts for a finished live session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveSummary {
    pub cycles: u64,
    pub skipped: u64,
    pub held: u64,
    pub submitted: u64,
    pub rejected: u64,
}

/// Poll until `max_cycles` is reached, sleeping `interval` between cycles.
pub fn run_live<F, G>(
    config: &LiveConfig,
    feed: &F,
    gateway: &mut G,
    log: &mut TradeLog,
) -> LiveSummary
where
    F: PriceFeed + ?Sized,
    G: OrderGateway + ?Sized,
{
    let mut summary = LiveSummary::default();
    info!(
        symbol = %config.symbol,
        interval_secs = config.interval.as_secs(),
        max_cycles = ?config.max_cycles,
        "live loop started"
    );

    loop {
        match run_cycle(config, feed, gateway, log) {
            CycleOutcome::Skipped { .. } => summary.skipped += 1,
            CycleOutcome::Held { .. } => summary.held += 1,
            CycleOutcome::Submitted { .. } => summary.submitted += 1,
            CycleOutcome::Rejected { .. } => summary.rejected += 1,
        }
        summary.cycles += 1;

        if config.max_cycles.is_some_and(|max| summary.cycles >= max) {
            break;
        }
        if !config.interval.is_zero() {
            std::thread::sleep(config.interval);
        }
    }

    info!(
        cycles = summary.cycles,
        submitted = summary.submitted,
        skipped = summary.skipped,
        "live loop finished"
    );
    summary
}
