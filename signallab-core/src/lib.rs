//! SignalLab Core: decision rule, rolling indicators, backtest ledger, and
//! the collaborator traits used by the live loop.
//!
//! - Domain types (price points, bars, signals, orders, portfolio state)
//! - Rolling indicators and feature preparation
//! - Backtest fold over a price series
//! - Trading environment for RL agents
//! - Market data providers, order gateways, and predictors

pub mod broker;
pub mod data;
pub mod domain;
pub mod engine;
pub mod env;
pub mod features;
pub mod indicators;
pub mod model;
pub mod strategy;
