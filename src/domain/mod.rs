//! Core domain types and logic.

pub mod ohlcv;
pub mod signal;
pub mod indicator;
pub mod strategy;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod risk;
pub mod backtest;
pub mod metrics;
pub mod sweep;
pub mod aggregate;
pub mod universe;
pub mod run_config;
pub mod config_validation;
pub mod error;
