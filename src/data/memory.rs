//! In-memory tick source

use super::{DataError, TickSource};
use crate::feed::Tick;
use async_trait::async_trait;
use std::collections::HashMap;

/// Serves ticks held in memory; useful for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    series: HashMap<String, Vec<Tick>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add ticks for a symbol, appending to any already present
    pub fn insert(&mut self, symbol: impl Into<String>, ticks: Vec<Tick>) -> &mut Self {
        self.series.entry(symbol.into()).or_default().extend(ticks);
        self
    }

    /// Builder-style [`MemorySource::insert`]
    pub fn with_series(mut self, symbol: impl Into<String>, ticks: Vec<Tick>) -> Self {
        self.insert(symbol, ticks);
        self
    }
}

#[async_trait]
impl TickSource for MemorySource {
    async fn open(&self, symbol: &str) -> Result<Vec<Tick>, DataError> {
        self.series
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::UnknownSymbol(symbol.to_string()))
    }
}
