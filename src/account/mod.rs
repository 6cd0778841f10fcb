//! Account module
//!
//! Simulated brokerage accounts: cash, positions and order history

mod position;
mod store;

pub use position::Position;
pub use store::{Account, AccountId, AccountStore, EquityPoint};
