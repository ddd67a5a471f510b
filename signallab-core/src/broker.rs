//! Order gateways.
//!
//! The live loop submits market orders through [`OrderGateway`]. The only
//! bundled gateway is [`PaperBroker`], which fills in memory at the last
//! observed price.

use crate::domain::{OrderConfirmation, OrderRequest, OrderSide};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("gateway transport failure: {0}")]
    Transport(String),
}

pub trait OrderGateway {
    fn submit(&mut self, order: &OrderRequest) -> Result<OrderConfirmation, BrokerError>;

    /// Latest market price for `symbol`. Gateways that price their own
    /// fills may ignore it.
    fn observe_price(&mut self, _symbol: &str, _price: f64) {}
}

/// One simulated execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperFill {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
}

/// In-memory gateway with sequential ids and net positions per symbol.
///
/// Sells may take a position short; the live loop does not track holdings.
#[derive(Debug, Default)]
pub struct PaperBroker {
    next_id: u64,
    marks: HashMap<String, f64>,
    positions: HashMap<String, i64>,
    fills: Vec<PaperFill>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Net signed quantity held in `symbol`.
    pub fn position(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }

    pub fn fills(&self) -> &[PaperFill] {
        &self.fills
    }
}

impl OrderGateway for PaperBroker {
    fn submit(&mut self, order: &OrderRequest) -> Result<OrderConfirmation, BrokerError> {
        if order.quantity == 0 {
            return Err(BrokerError::Rejected("quantity must be positive".into()));
        }
        let price = *self.marks.get(&order.symbol).ok_or_else(|| {
            BrokerError::Rejected(format!("no market price for {}", order.symbol))
        })?;
        let signed = i64::try_from(order.quantity)
            .map_err(|_| BrokerError::Rejected("quantity too large".into()))?;

        self.next_id += 1;
        let order_id = format!("paper-{:06}", self.next_id);
        let net = self.positions.entry(order.symbol.clone()).or_insert(0);
        match order.side {
            OrderSide::Buy => *net += signed,
            OrderSide::Sell => *net -= signed,
        }

        info!(
            order_id = %order_id,
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            price,
            "paper fill"
        );
        self.fills.push(PaperFill {
            order_id: order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price,
        });

        Ok(OrderConfirmation {
            order_id,
            symbol: order.symbol.clone(),
            quantity: order.quantity,
            side: order.side,
            submitted_at: Utc::now().naive_utc(),
        })
    }

    fn observe_price(&mut self, symbol: &str, price: f64) {
        self.marks.insert(symbol.to_string(), price);
    }
}
