//! Position tracking

use crate::execution::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Held quantity and average cost basis for one symbol.
///
/// Quantity is signed: negative while short.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Signed held quantity
    pub quantity: Decimal,
    /// Average entry price of the open quantity
    pub cost_basis: Decimal,
}

impl Position {
    /// Open quantity valued at cost
    pub fn book_value(&self) -> Decimal {
        self.quantity * self.cost_basis
    }

    /// Open quantity valued at `price`
    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.quantity * price
    }

    /// Unrealized P&L against `price`
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        (price - self.cost_basis) * self.quantity
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Apply a fill and return the realized P&L it produced.
    ///
    /// Adding to the position re-averages the cost basis; reducing it
    /// realizes P&L on the closed part. A fill larger than the open
    /// quantity flips the position, with the remainder opened at `price`.
    pub fn apply(&mut self, side: Side, quantity: Decimal, price: Decimal) -> Decimal {
        let delta = side.sign() * quantity;

        if self.quantity.is_zero() || self.quantity.is_sign_positive() == delta.is_sign_positive()
        {
            let open = self.quantity.abs();
            self.cost_basis = (open * self.cost_basis + quantity * price) / (open + quantity);
            self.quantity += delta;
            return Decimal::ZERO;
        }

        let closing = quantity.min(self.quantity.abs());
        let direction = if self.quantity.is_sign_positive() {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        };
        let realized = closing * (price - self.cost_basis) * direction;

        self.quantity += delta;
        if self.quantity.is_zero() {
            self.cost_basis = Decimal::ZERO;
        } else if quantity > closing {
            self.cost_basis = price;
        }

        realized
    }
}
