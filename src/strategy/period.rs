//! Periodic accumulation strategy

use super::{parse_params, Strategy, StrategyContext, StrategyError, StrategyParams};
use crate::execution::Order;
use crate::feed::Tick;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

/// Parameters for [`PeriodStrategy`]
#[derive(Debug, Clone, Deserialize)]
pub struct PeriodParams {
    /// Buy on every `period`-th tick of a symbol
    #[serde(default = "default_period")]
    pub period: u32,
    /// Shares bought each time
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
}

fn default_period() -> u32 {
    1
}
fn default_quantity() -> Decimal {
    Decimal::ONE
}

/// Buys a fixed quantity of each subscribed symbol every N ticks at the
/// tick's price
pub struct PeriodStrategy {
    symbols: Vec<String>,
    params: PeriodParams,
    counters: HashMap<String, u32>,
}

impl PeriodStrategy {
    pub const NAME: &'static str = "period";

    pub fn new(symbols: Vec<String>, params: PeriodParams) -> Result<Self, StrategyError> {
        if params.period == 0 {
            return Err(StrategyError::InvalidParams {
                strategy: Self::NAME.to_string(),
                message: "period must be at least 1".to_string(),
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
            counters: HashMap::new(),
        })
    }

    pub fn from_params(
        params: &StrategyParams,
        symbols: &[String],
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let params = parse_params(Self::NAME, params)?;
        Ok(Box::new(Self::new(symbols.to_vec(), params)?))
    }
}

impl Strategy for PeriodStrategy {
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
        // Ticks seen since the last buy, modulo the period
        let phase = self.counters.entry(tick.symbol.clone()).or_insert(0);
        let due = *phase == 0;
        *phase = (*phase + 1) % self.params.period;
        if !due {
            return Ok(vec![]);
        }

        Ok(vec![ctx.buy(
            tick.symbol.as_str(),
            self.params.quantity,
            tick.price(),
            tick.timestamp,
        )])
    }
}
