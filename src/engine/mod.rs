//! Trading engine module
//!
//! The dispatcher task that turns ticks into strategy calls and orders
//! into executions

mod dispatcher;

pub use dispatcher::{
    Dispatcher, DispatcherExit, DispatcherHandle, DispatcherPanic, DispatcherReport,
    DispatcherState, StrategyFailure,
};

use crate::account::AccountId;
use thiserror::Error;

/// Engine setup errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no account {0} in the store")]
    UnknownAccount(AccountId),
}
