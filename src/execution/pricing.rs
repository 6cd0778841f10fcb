//! Execution price policies

use super::{Order, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Decides the price an accepted order fills at
pub trait FillPricer: Send + Sync {
    fn fill_price(&self, order: &Order) -> Decimal;
}

/// Fill exactly at the requested price
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestedPrice;

impl FillPricer for RequestedPrice {
    fn fill_price(&self, order: &Order) -> Decimal {
        order.price
    }
}

/// Fixed slippage in basis points, always against the trader
#[derive(Debug, Clone, Copy)]
pub struct SlippageBps {
    bps: Decimal,
}

impl SlippageBps {
    pub fn new(bps: Decimal) -> Self {
        Self { bps }
    }
}

impl FillPricer for SlippageBps {
    fn fill_price(&self, order: &Order) -> Decimal {
        let adjustment = order.price * self.bps / dec!(10000);
        match order.side {
            Side::Buy => order.price + adjustment,
            Side::Sell => order.price - adjustment,
        }
    }
}
