//! Single-asset trading environment for reinforcement-learning agents.
//!
//! Observation is the current close. One unit trades per action, with no
//! cash check on buys: the balance may go negative, which is what the
//! agent is trained against. This ledger is separate from the backtest's
//! [`PortfolioState`](crate::domain::PortfolioState).

use crate::domain::Signal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const INITIAL_BALANCE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("environment needs at least one price")]
    Empty,

    #[error("episode is done; call reset()")]
    Done,

    #[error("invalid action {0} (expected 0 = hold, 1 = buy, 2 = sell)")]
    InvalidAction(u8),
}

/// Discrete action space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Hold = 0,
    Buy = 1,
    Sell = 2,
}

impl TryFrom<u8> for Action {
    type Error = EnvError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Action::Hold),
            1 => Ok(Action::Buy),
            2 => Ok(Action::Sell),
            other => Err(EnvError::InvalidAction(other)),
        }
    }
}

impl From<Action> for Signal {
    fn from(action: Action) -> Self {
        match action {
            Action::Hold => Signal::Hold,
            Action::Buy => Signal::Buy,
            Action::Sell => Signal::Sell,
        }
    }
}

/// Outcome of one environment step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub observation: f64,
    pub reward: f64,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct TradingEnv {
    closes: Vec<f64>,
    current_step: usize,
    balance: f64,
    shares: u64,
}

impl TradingEnv {
    pub fn new(closes: Vec<f64>) -> Result<Self, EnvError> {
        if closes.is_empty() {
            return Err(EnvError::Empty);
        }
        Ok(Self {
            closes,
            current_step: 0,
            balance: INITIAL_BALANCE,
            shares: 0,
        })
    }

    /// Restore the initial state and return the first observation.
    pub fn reset(&mut self) -> f64 {
        self.current_step = 0;
        self.balance = INITIAL_BALANCE;
        self.shares = 0;
        self.observation()
    }

    pub fn observation(&self) -> f64 {
        self.closes[self.current_step]
    }

    /// Apply `action` at the current close and advance one step.
    ///
    /// Sell pays the sale price as reward; other actions reward zero.
    pub fn step(&mut self, action: Action) -> Result<StepOutcome, EnvError> {
        if self.is_done() {
            return Err(EnvError::Done);
        }
        let price = self.closes[self.current_step];
        let mut reward = 0.0;

        match action {
            Action::Buy => {
                self.shares += 1;
                self.balance -= price;
            }
            Action::Sell if self.shares > 0 => {
                self.shares -= 1;
                self.balance += price;
                reward = price;
            }
            Action::Sell | Action::Hold => {}
        }

        self.current_step += 1;
        Ok(StepOutcome {
            observation: self.observation(),
            reward,
            done: self.is_done(),
        })
    }

    /// The episode ends on the last price.
    pub fn is_done(&self) -> bool {
        self.current_step + 1 >= self.closes.len()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn shares(&self) -> u64 {
        self.shares
    }

    /// Balance plus shares marked at `price`.
    pub fn net_worth(&self, price: f64) -> f64 {
        self.balance + self.shares as f64 * price
    }

    /// Net worth change since the start of the episode.
    pub fn profit(&self, price: f64) -> f64 {
        self.net_worth(price) - INITIAL_BALANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prices_rejected() {
        assert_eq!(TradingEnv::new(vec![]).unwrap_err(), EnvError::Empty);
    }

    #[test]
    fn buy_then_sell_episode() {
        let mut env = TradingEnv::new(vec![100.0, 110.0, 120.0]).unwrap();
        assert_eq!(env.reset(), 100.0);

        let out = env.step(Action::Buy).unwrap();
        assert_eq!(out.observation, 110.0);
        assert_eq!(out.reward, 0.0);
        assert!(!out.done);
        assert_eq!(env.shares(), 1);
        assert_eq!(env.balance(), 9_900.0);

        let out = env.step(Action::Sell).unwrap();
        assert_eq!(out.reward, 110.0);
        assert!(out.done);
        assert_eq!(env.shares(), 0);
        assert_eq!(env.balance(), 10_010.0);
        assert_eq!(env.profit(120.0), 10.0);

        assert_eq!(env.step(Action::Hold), Err(EnvError::Done));
    }

    #[test]
    fn sell_without_shares_is_ignored() {
        let mut env = TradingEnv::new(vec![50.0, 60.0]).unwrap();
        let out = env.step(Action::Sell).unwrap();
        assert_eq!(out.reward, 0.0);
        assert_eq!(env.balance(), INITIAL_BALANCE);
    }

    #[test]
    fn buys_may_overdraw() {
        let mut env = TradingEnv::new(vec![20_000.0, 1.0]).unwrap();
        env.step(Action::Buy).unwrap();
        assert!(env.balance() < 0.0);
    }

    #[test]
    fn single_price_is_immediately_done() {
        let mut env = TradingEnv::new(vec![42.0]).unwrap();
        assert!(env.is_done());
        assert_eq!(env.step(Action::Buy), Err(EnvError::Done));
    }

    #[test]
    fn reset_restores_state() {
        let mut env = TradingEnv::new(vec![1.0, 2.0, 3.0]).unwrap();
        env.step(Action::Buy).unwrap();
        env.reset();
        assert_eq!(env.current_step(), 0);
        assert_eq!(env.shares(), 0);
        assert_eq!(env.balance(), INITIAL_BALANCE);
    }

    #[test]
    fn action_codes() {
        assert_eq!(Action::try_from(1).unwrap(), Action::Buy);
        assert_eq!(Action::try_from(9), Err(EnvError::InvalidAction(9)));
        assert_eq!(Signal::from(Action::Sell), Signal::Sell);
    }
}
