//! Core domain types and logic.

pub mod aggregator;
pub mod backtest;
pub mod candle;
pub mod config;
pub mod error;
pub mod frame;
pub mod indicator;
pub mod ledger;
pub mod optimizer;
pub mod rules;
pub mod signal;
pub mod tick;
pub mod trade_params;
pub mod trading;
