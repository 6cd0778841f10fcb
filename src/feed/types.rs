//! Tick types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shape of the historical records a run replays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    /// OHLCV bars
    #[default]
    Quote,
    /// Individual trades carrying a single price
    Tick,
}

/// One timestamped price observation for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Trading symbol (e.g., "AAPL")
    pub symbol: String,
    /// Observation time
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Tick {
    /// Create an OHLCV bar
    pub fn quote(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Create a single-price trade tick
    pub fn trade(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        price: Decimal,
        volume: Decimal,
    ) -> Self {
        Self::quote(symbol, timestamp, price, price, price, price, volume)
    }

    /// Reference price used for marking and default order pricing
    pub fn price(&self) -> Decimal {
        self.close
    }
}
