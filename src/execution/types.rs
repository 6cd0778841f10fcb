//! Execution types

use crate::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Order identifier
pub type OrderId = Uuid;

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells
    pub fn sign(self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created by a strategy, not yet executed
    Pending,
    /// Applied to the account
    Filled,
    /// Refused by the executor
    Rejected,
}

/// An order produced by a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID
    pub id: OrderId,
    /// Account the order trades for
    pub account_id: AccountId,
    /// Trading symbol
    pub symbol: String,
    /// Trade side
    pub side: Side,
    /// Order quantity
    pub quantity: Decimal,
    /// Requested price
    pub price: Decimal,
    /// Tick time the order was produced at
    pub timestamp: DateTime<Utc>,
    /// Execution price, set once filled
    pub fill_price: Option<Decimal>,
    /// Fees paid
    pub fee: Decimal,
    pub status: OrderStatus,
}

impl Order {
    /// Create a pending order
    pub fn new(
        account_id: AccountId,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            symbol: symbol.into(),
            side,
            quantity,
            price,
            timestamp,
            fill_price: None,
            fee: Decimal::ZERO,
            status: OrderStatus::Pending,
        }
    }

    /// Pending buy order
    pub fn buy(
        account_id: AccountId,
        symbol: impl Into<String>,
        quantity: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(account_id, symbol, Side::Buy, quantity, price, timestamp)
    }

    /// Pending sell order
    pub fn sell(
        account_id: AccountId,
        symbol: impl Into<String>,
        quantity: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(account_id, symbol, Side::Sell, quantity, price, timestamp)
    }

    /// Cash paid (buys) or received (sells) excluding fees
    pub fn notional(&self) -> Decimal {
        self.fill_price.unwrap_or(self.price) * self.quantity
    }
}

/// Why the executor refused an order. Not an error: the strategy is told
/// and the run carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),
    #[error("price must be positive, got {0}")]
    InvalidPrice(Decimal),
    #[error("order time {0} is outside the trading window")]
    OutsideWindow(DateTime<Utc>),
    #[error("insufficient cash: required {required}, available {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },
    #[error("insufficient quantity of {symbol}: held {held}, requested {requested}")]
    InsufficientQuantity {
        symbol: String,
        held: Decimal,
        requested: Decimal,
    },
}
