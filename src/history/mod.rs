//! Read-only market history shared by the strategies of a run
//!
//! Built once by the tick feeder from the data access module and never
//! mutated afterwards, so it can be handed out behind an `Arc`.

use crate::feed::Tick;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Full price history per symbol, sorted by timestamp
#[derive(Debug, Default)]
pub struct MarketData {
    series: HashMap<String, Vec<Tick>>,
}

impl MarketData {
    /// Build from per-symbol histories that are already in time order
    pub fn new(series: HashMap<String, Vec<Tick>>) -> Self {
        Self { series }
    }

    /// Symbols with history loaded
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Complete history of a symbol
    pub fn history(&self, symbol: &str) -> &[Tick] {
        self.series.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Close of the latest tick at or before `time`
    pub fn price_at(&self, symbol: &str, time: DateTime<Utc>) -> Option<Decimal> {
        let ticks = self.history(symbol);
        let idx = ticks.partition_point(|t| t.timestamp <= time);
        idx.checked_sub(1).map(|i| ticks[i].price())
    }

    /// Up to `window` most recent ticks strictly before `time`, oldest first
    pub fn series_before(&self, symbol: &str, time: DateTime<Utc>, window: usize) -> &[Tick] {
        let ticks = self.history(symbol);
        let end = ticks.partition_point(|t| t.timestamp < time);
        &ticks[end.saturating_sub(window)..end]
    }
}
