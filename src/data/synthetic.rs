//! Deterministic synthetic price series

use crate::feed::{Tick, TradeType};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// Shape of a generated series
#[derive(Debug, Clone)]
pub struct SyntheticSeries {
    pub start: DateTime<Utc>,
    pub bars: usize,
    pub start_price: Decimal,
    pub trade_type: TradeType,
}

impl SyntheticSeries {
    /// Daily bars for `symbol`.
    ///
    /// The same symbol always yields the same series; different symbols get
    /// different phases.
    pub fn generate(&self, symbol: &str) -> Vec<Tick> {
        let seed = symbol.bytes().map(f64::from).sum::<f64>();
        let base: f64 = self.start_price.try_into().unwrap_or(100.0);

        let mut ticks = Vec::with_capacity(self.bars);
        let mut prev = self.start_price;
        for i in 0..self.bars {
            let x = i as f64;
            let wave = 0.08 * (x / 15.0 + seed).sin() + 0.03 * (x / 4.0 + seed * 0.5).sin();
            let drift = 0.0004 * x;
            let close = price(base * (1.0 + wave + drift));
            let volume = Decimal::from(1_000 + (i * 37 + seed as usize) % 500);
            let timestamp = self.start + Duration::days(i as i64);

            let tick = match self.trade_type {
                TradeType::Quote => {
                    let open = prev;
                    let spread = price(base * 0.004);
                    Tick::quote(
                        symbol,
                        timestamp,
                        open,
                        open.max(close) + spread,
                        (open.min(close) - spread).max(Decimal::new(1, 2)),
                        close,
                        volume,
                    )
                }
                TradeType::Tick => Tick::trade(symbol, timestamp, close, volume),
            };
            ticks.push(tick);
            prev = close;
        }
        ticks
    }
}

fn price(value: f64) -> Decimal {
    Decimal::try_from(value.max(0.01))
        .unwrap_or(Decimal::ONE)
        .round_dp(2)
}
