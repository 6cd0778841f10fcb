//! Historical tick feeder

use super::Tick;
use crate::data::{DataError, TickSource};
use crate::history::MarketData;
use crate::telemetry::{set_gauge, GaugeMetric};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Feeding errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// The dispatcher stopped receiving before the feed was exhausted
    #[error("dispatcher closed the tick channel after {emitted} ticks")]
    DispatcherClosed { emitted: usize },
}

/// Replays the histories of a symbol set in time order.
///
/// All history is loaded up front into the shared [`MarketData`]; only
/// ticks at or after `start` are emitted.
pub struct TickFeeder {
    symbols: Vec<String>,
    start: Option<DateTime<Utc>>,
    market: Arc<MarketData>,
}

impl TickFeeder {
    /// Load every symbol through `source`.
    ///
    /// A symbol listed more than once is loaded and replayed once.
    pub async fn load(
        source: &dyn TickSource,
        symbols: &[String],
        start: Option<DateTime<Utc>>,
    ) -> Result<Self, DataError> {
        let mut unique: Vec<String> = Vec::with_capacity(symbols.len());
        let mut series = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            if series.contains_key(symbol) {
                continue;
            }
            let ticks = source.open(symbol).await?;
            if let Some(index) = ticks
                .windows(2)
                .position(|w| w[1].timestamp < w[0].timestamp)
            {
                return Err(DataError::OutOfOrder {
                    symbol: symbol.clone(),
                    index: index + 1,
                });
            }
            tracing::debug!(%symbol, ticks = ticks.len(), "Loaded history");
            series.insert(symbol.clone(), ticks);
            unique.push(symbol.clone());
        }

        Ok(Self {
            symbols: unique,
            start,
            market: Arc::new(MarketData::new(series)),
        })
    }

    /// Shared read-only history for strategies
    pub fn market_data(&self) -> Arc<MarketData> {
        Arc::clone(&self.market)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Lazy merged iterator over all symbols, starting over from `start`
    pub fn ticks(&self) -> FeedIter<'_> {
        let cursors: Vec<&[Tick]> = self
            .symbols
            .iter()
            .map(|symbol| {
                let history = self.market.history(symbol);
                let first = match self.start {
                    Some(start) => history.partition_point(|t| t.timestamp < start),
                    None => 0,
                };
                &history[first..]
            })
            .collect();

        let heap = cursors
            .iter()
            .enumerate()
            .filter_map(|(slot, ticks)| ticks.first().map(|t| Reverse((t.timestamp, slot, 0))))
            .collect();

        FeedIter { cursors, heap }
    }

    /// Push every tick into `sink`, waiting whenever it is full.
    ///
    /// Returns the number of ticks emitted once the feed is exhausted.
    pub async fn feed(&self, sink: &mpsc::Sender<Tick>) -> Result<usize, FeedError> {
        let mut emitted = 0;
        for tick in self.ticks() {
            if sink.send(tick.clone()).await.is_err() {
                return Err(FeedError::DispatcherClosed { emitted });
            }
            emitted += 1;
            set_gauge(GaugeMetric::QueuedTicks, queued(sink) as f64);
        }

        tracing::debug!(emitted, "Feed exhausted");
        Ok(emitted)
    }
}

/// Ticks sent but not yet received
fn queued(sink: &mpsc::Sender<Tick>) -> usize {
    sink.max_capacity() - sink.capacity()
}

/// K-way merge of per-symbol tick slices.
///
/// Ties on timestamp go to the symbol listed first.
pub struct FeedIter<'a> {
    cursors: Vec<&'a [Tick]>,
    heap: BinaryHeap<Reverse<(DateTime<Utc>, usize, usize)>>,
}

impl<'a> Iterator for FeedIter<'a> {
    type Item = &'a Tick;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((_, slot, pos)) = self.heap.pop()?;
        let ticks = self.cursors[slot];
        if let Some(next) = ticks.get(pos + 1) {
            self.heap.push(Reverse((next.timestamp, slot, pos + 1)));
        }
        Some(&ticks[pos])
    }
}
