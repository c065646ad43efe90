//! Core domain types and logic.

pub mod backtest;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod exit_policy;
pub mod ledger;
pub mod metrics;
pub mod ohlcv;
pub mod position;
pub mod scanner;
pub mod universe;
