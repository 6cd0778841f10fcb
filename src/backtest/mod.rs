//! Backtesting module
//!
//! Runs one backtest per symbol list and aggregates the results

mod analytics;
mod batch;
mod runner;

pub use analytics::{BatchReport, BatchSummary, MetricsAggregator, RunMetrics};
pub use batch::{Backtester, RunFailure};
pub use runner::{run_name, RunCoordinator, RunResult};

use crate::config::ConfigError;
use crate::data::DataError;
use crate::engine::{DispatcherPanic, EngineError, StrategyFailure};
use crate::feed::FeedError;
use crate::saver::SaverError;
use crate::strategy::StrategyError;
use std::time::Duration;
use thiserror::Error;

/// Backtest errors.
///
/// Everything but [`BacktestError::Interrupted`] fails only the run it
/// happened in.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error(transparent)]
    StrategyFailed(#[from] StrategyFailure),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("state saver error: {0}")]
    Saver(#[from] SaverError),
    #[error(transparent)]
    DispatcherPanicked(#[from] DispatcherPanic),
    #[error("dispatcher did not stop within {timeout:?}")]
    ShutdownTimeout { timeout: Duration },
    #[error("interrupted after {completed} completed runs")]
    Interrupted { completed: usize },
}
