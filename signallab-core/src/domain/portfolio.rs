//! PortfolioState: the cash/position ledger folded over a backtest.

use super::order::OrderSide;
use super::signal::Signal;
use serde::{Deserialize, Serialize};

/// Cash plus a whole-unit long position.
///
/// Invariants: `cash >= 0` and `position >= 0` (enforced by `u64`).
/// Transitions never mutate in place; [`PortfolioState::apply`] returns the
/// next state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: f64,
    pub position: u64,
}

/// A ledger change made by one transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerFill {
    pub side: OrderSide,
    pub quantity: u64,
    pub price: f64,
}

impl PortfolioState {
    /// Fresh state: all cash, no position.
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            position: 0,
        }
    }

    /// Total equity = cash + position marked at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position as f64 * price
    }

    pub fn is_flat(&self) -> bool {
        self.position == 0
    }

    /// Apply one signal at `price`.
    ///
    /// - `Buy` with `cash >= price`: buy `floor(cash / price)` units and add
    ///   them to any existing position.
    /// - `Sell` with an open position: liquidate all of it.
    /// - Anything else leaves the state unchanged.
    ///
    /// The position is capped at `u64::MAX`; cash that would buy past the cap
    /// stays unspent.
    ///
    /// `price` must be a positive finite number; callers flag malformed
    /// prices before reaching the ledger.
    pub fn apply(self, signal: Signal, price: f64) -> (Self, Option<LedgerFill>) {
        match signal {
            Signal::Buy if self.cash >= price => {
                let room = u64::MAX - self.position;
                let affordable = (self.cash / price).floor();
                let quantity = if affordable >= room as f64 {
                    room
                } else {
                    affordable as u64
                };
                if quantity == 0 {
                    return (self, None);
                }
                // Clamp absorbs rounding residue from qty * price.
                let cash = (self.cash - quantity as f64 * price).max(0.0);
                let next = Self {
                    cash,
                    position: self.position.saturating_add(quantity),
                };
                let fill = LedgerFill {
                    side: OrderSide::Buy,
                    quantity,
                    price,
                };
                (next, Some(fill))
            }
            Signal::Sell if self.position > 0 => {
                let next = Self {
                    cash: self.cash + self.position as f64 * price,
                    position: 0,
                };
                let fill = LedgerFill {
                    side: OrderSide::Sell,
                    quantity: self.position,
                    price,
                };
                (next, Some(fill))
            }
            _ => (self, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_all_affordable() {
        let (state, fill) = PortfolioState::new(1000.0).apply(Signal::Buy, 100.0);
        assert_eq!(state.position, 10);
        assert_eq!(state.cash, 0.0);
        assert_eq!(state.equity(100.0), 1000.0);
        let fill = fill.unwrap();
        assert_eq!(fill.side, OrderSide::Buy);
        assert_eq!(fill.quantity, 10);
    }

    #[test]
    fn buy_leaves_remainder_cash() {
        let (state, _) = PortfolioState::new(1050.0).apply(Signal::Buy, 100.0);
        assert_eq!(state.position, 10);
        assert!((state.cash - 50.0).abs() < 1e-9);
    }

    #[test]
    fn buy_adds_to_existing_position() {
        let start = PortfolioState {
            cash: 300.0,
            position: 5,
        };
        let (state, fill) = start.apply(Signal::Buy, 100.0);
        assert_eq!(state.position, 8);
        assert_eq!(state.cash, 0.0);
        assert_eq!(fill.unwrap().quantity, 3);
    }

    #[test]
    fn buy_without_cash_is_noop() {
        let start = PortfolioState {
            cash: 99.0,
            position: 3,
        };
        let (state, fill) = start.apply(Signal::Buy, 100.0);
        assert_eq!(state, start);
        assert!(fill.is_none());
    }

    #[test]
    fn sell_liquidates_everything() {
        let start = PortfolioState {
            cash: 0.0,
            position: 10,
        };
        let (state, fill) = start.apply(Signal::Sell, 100.0);
        assert_eq!(state.position, 0);
        assert_eq!(state.cash, 1000.0);
        // Equity unchanged at the point of sale.
        assert_eq!(state.equity(100.0), start.equity(100.0));
        assert_eq!(fill.unwrap().quantity, 10);
    }

    #[test]
    fn sell_when_flat_is_noop() {
        let start = PortfolioState::new(500.0);
        let (state, fill) = start.apply(Signal::Sell, 100.0);
        assert_eq!(state, start);
        assert!(fill.is_none());
    }

    #[test]
    fn buy_caps_position_at_u64_max() {
        let (first, fill) = PortfolioState::new(1e12).apply(Signal::Buy, 1e-8);
        assert_eq!(first.position, u64::MAX);
        assert_eq!(fill.unwrap().quantity, u64::MAX);
        assert!(first.cash >= 0.0);

        let (second, fill) = first.apply(Signal::Buy, 1e-8);
        assert_eq!(second, first);
        assert!(fill.is_none());
    }

    #[test]
    fn buy_near_cap_fills_remaining_room() {
        let start = PortfolioState {
            cash: 1e12,
            position: u64::MAX - 5,
        };
        let (state, fill) = start.apply(Signal::Buy, 1e-8);
        assert_eq!(state.position, u64::MAX);
        assert_eq!(fill.unwrap().quantity, 5);
    }

    #[test]
    fn hold_is_noop() {
        let start = PortfolioState {
            cash: 12.5,
            position: 4,
        };
        assert_eq!(start.apply(Signal::Hold, 100.0), (start, None));
    }
}
