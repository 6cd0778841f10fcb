//! Strategy module
//!
//! The capability contract strategies implement, the registry that maps
//! configured names to constructors, and the built-in strategies.

mod period;
mod registry;
mod sma;

pub use period::{PeriodParams, PeriodStrategy};
pub use registry::{StrategyCtor, StrategyRegistry};
pub use sma::{SmaParams, SmaStrategy};

use crate::account::{Account, AccountId};
use crate::execution::{Order, RejectReason};
use crate::feed::Tick;
use crate::history::MarketData;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Strategy-specific parameter table from the `[strategy.params]` section
pub type StrategyParams = toml::Table;

/// Strategy errors
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Parameters did not match what the strategy expects
    #[error("invalid parameters for {strategy}: {message}")]
    InvalidParams { strategy: String, message: String },
    /// The handler could not process a tick
    #[error("{0}")]
    Handler(String),
}

/// Deserialize a parameter table into a strategy's typed parameters
pub fn parse_params<T: DeserializeOwned>(
    strategy: &str,
    params: &StrategyParams,
) -> Result<T, StrategyError> {
    toml::Value::Table(params.clone())
        .try_into()
        .map_err(|e: toml::de::Error| StrategyError::InvalidParams {
            strategy: strategy.to_string(),
            message: e.message().to_string(),
        })
}

/// Read-only view handed to a strategy for each tick
pub struct StrategyContext<'a> {
    /// Account the strategy trades for
    pub account_id: AccountId,
    /// Account state as of the previous fill
    pub account: &'a Account,
    /// Shared market history
    pub market: &'a MarketData,
    /// Simulated clock: timestamp of the tick being dispatched
    pub now: DateTime<Utc>,
}

impl StrategyContext<'_> {
    /// Pending buy for this strategy's account
    pub fn buy(
        &self,
        symbol: impl Into<String>,
        quantity: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Order {
        Order::buy(self.account_id, symbol, quantity, price, timestamp)
    }

    /// Pending sell for this strategy's account
    pub fn sell(
        &self,
        symbol: impl Into<String>,
        quantity: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Order {
        Order::sell(self.account_id, symbol, quantity, price, timestamp)
    }
}

/// Trait for trading strategy implementations
pub trait Strategy: Send {
    /// Name used in logs and saver output
    fn name(&self) -> &str;

    /// Symbols this strategy subscribes to
    fn symbols(&self) -> &[String];

    /// Handle one tick, returning the orders to execute in order
    fn on_tick(&mut self, tick: &Tick, ctx: &StrategyContext<'_>)
        -> Result<Vec<Order>, StrategyError>;

    /// Called after one of this strategy's orders filled
    fn on_fill(&mut self, _order: &Order) {}

    /// Called after one of this strategy's orders was rejected
    fn on_rejection(&mut self, _order: &Order, _reason: &RejectReason) {}
}
