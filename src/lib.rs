//! backtester: tick-replay backtesting engine
//!
//! This library provides the core components for:
//! - Loading symbol histories from pluggable data backends
//! - Replaying ticks in time order into a dispatcher task
//! - Strategy dispatch with simulated order execution
//! - Account, position and equity bookkeeping
//! - Per-run and batch performance metrics
//! - Optional persistence of run state to Parquet
//! - Structured logging and Prometheus metrics

pub mod account;
pub mod backtest;
pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod execution;
pub mod feed;
pub mod history;
pub mod registry;
pub mod saver;
pub mod strategy;
pub mod telemetry;
