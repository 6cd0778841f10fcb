//! Moving-average crossover strategy

use super::{parse_params, Strategy, StrategyContext, StrategyError, StrategyParams};
use crate::execution::Order;
use crate::feed::Tick;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

/// Parameters for [`SmaStrategy`]
#[derive(Debug, Clone, Deserialize)]
pub struct SmaParams {
    #[serde(default = "default_short_window")]
    pub short_window: usize,
    #[serde(default = "default_long_window")]
    pub long_window: usize,
    /// Shares bought on each golden cross
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
}

fn default_short_window() -> usize {
    5
}
fn default_long_window() -> usize {
    20
}
fn default_quantity() -> Decimal {
    Decimal::from(100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Above,
    Below,
}

/// Buys when the short average crosses above the long one and sells the
/// whole holding when it crosses back below.
///
/// Averages include the current tick; earlier ticks come from the shared
/// market history.
pub struct SmaStrategy {
    symbols: Vec<String>,
    params: SmaParams,
    trends: HashMap<String, Trend>,
}

impl SmaStrategy {
    pub const NAME: &'static str = "sma";

    pub fn new(symbols: Vec<String>, params: SmaParams) -> Result<Self, StrategyError> {
        if params.short_window == 0 || params.short_window >= params.long_window {
            return Err(StrategyError::InvalidParams {
                strategy: Self::NAME.to_string(),
                message: format!(
                    "short_window ({}) must be positive and below long_window ({})",
                    params.short_window, params.long_window
                ),
            });
        }
        if params.quantity <= Decimal::ZERO {
            return Err(StrategyError::InvalidParams {
                strategy: Self::NAME.to_string(),
                message: "quantity must be positive".to_string(),
            });
        }
        Ok(Self {
            symbols,
            params,
            trends: HashMap::new(),
        })
    }

    pub fn from_params(
        params: &StrategyParams,
        symbols: &[String],
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let params = parse_params(Self::NAME, params)?;
        Ok(Box::new(Self::new(symbols.to_vec(), params)?))
    }

    fn average(tick: &Tick, ctx: &StrategyContext<'_>, window: usize) -> Option<Decimal> {
        let earlier = ctx.market.series_before(&tick.symbol, tick.timestamp, window - 1);
        if earlier.len() < window - 1 {
            return None;
        }
        let sum: Decimal = earlier.iter().map(Tick::price).sum::<Decimal>() + tick.price();
        Some(sum / Decimal::from(window))
    }
}

impl Strategy for SmaStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn on_tick(
        &mut self,
        tick: &Tick,
        ctx: &StrategyContext<'_>,
    ) -> Result<Vec<Order>, StrategyError> {
        let (Some(short), Some(long)) = (
            Self::average(tick, ctx, self.params.short_window),
            Self::average(tick, ctx, self.params.long_window),
        ) else {
            return Ok(vec![]);
        };

        let trend = if short > long {
            Trend::Above
        } else {
            Trend::Below
        };
        let previous = self.trends.insert(tick.symbol.clone(), trend);

        let orders = match (previous, trend) {
            (Some(Trend::Below), Trend::Above) => vec![ctx.buy(
                tick.symbol.as_str(),
                self.params.quantity,
                tick.price(),
                tick.timestamp,
            )],
            (Some(Trend::Above), Trend::Below) => {
                let held = ctx.account.held(&tick.symbol);
                if held > Decimal::ZERO {
                    vec![ctx.sell(tick.symbol.as_str(), held, tick.price(), tick.timestamp)]
                } else {
                    vec![]
                }
            }
            _ => vec![],
        };

        Ok(orders)
    }
}
