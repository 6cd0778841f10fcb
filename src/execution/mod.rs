//! Execution module
//!
//! Validates strategy orders and fills them against simulated accounts

mod executor;
mod pricing;
mod types;

pub use executor::{OrderExecutor, TradingWindow};
pub use pricing::{FillPricer, RequestedPrice, SlippageBps};
pub use types::{Order, OrderId, OrderStatus, RejectReason, Side};
