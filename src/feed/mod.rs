//! Tick feed module
//!
//! Historical ticks and the feeder that replays them into the dispatcher

mod feeder;
mod types;

pub use feeder::{FeedError, FeedIter, TickFeeder};
pub use types::{Tick, TradeType};
