//! Data access module
//!
//! Historical tick backends the feeder loads symbol histories from

mod memory;
mod parquet;
mod synthetic;

pub use self::parquet::{quote_schema, read_ticks, trade_schema, write_ticks, ParquetSource};
pub use memory::MemorySource;
pub use synthetic::SyntheticSeries;

use crate::config::{ConfigError, DataConfig};
use crate::feed::{Tick, TradeType};
use crate::registry::Registry;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Data access errors
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no history for symbol {0}")]
    UnknownSymbol(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("invalid data: {0}")]
    Schema(String),
    #[error("invalid decimal '{value}': {source}")]
    Decimal {
        value: String,
        #[source]
        source: rust_decimal::Error,
    },
    #[error("ticks for {symbol} are out of time order at index {index}")]
    OutOfOrder { symbol: String, index: usize },
    #[error("data loading task failed: {0}")]
    Task(String),
}

/// Trait for historical data backends
#[async_trait]
pub trait TickSource: Send + Sync {
    /// Full history of `symbol` in non-decreasing time order
    async fn open(&self, symbol: &str) -> Result<Vec<Tick>, DataError>;
}

/// Builds a data backend from the `[data]` section
pub type DataBackendCtor = fn(&DataConfig, TradeType) -> Result<Arc<dyn TickSource>, ConfigError>;

/// Data backends selectable by name from configuration
pub struct DataBackendRegistry {
    inner: Registry<DataBackendCtor>,
}

impl DataBackendRegistry {
    /// Registry with the built-in backends
    pub fn with_builtins() -> Self {
        let mut inner: Registry<DataBackendCtor> = Registry::new("data backend");
        inner.register("parquet", |config, trade_type| {
            if !config.path.is_dir() {
                return Err(ConfigError::Invalid {
                    field: "data.path",
                    message: format!("{} is not a directory", config.path.display()),
                });
            }
            let source: Arc<dyn TickSource> =
                Arc::new(ParquetSource::new(config.path.clone(), trade_type));
            Ok(source)
        });
        Self { inner }
    }

    pub fn register(&mut self, name: impl Into<String>, ctor: DataBackendCtor) -> &mut Self {
        self.inner.register(name, ctor);
        self
    }

    /// Resolve and construct the configured backend
    pub fn build(
        &self,
        config: &DataConfig,
        trade_type: TradeType,
    ) -> Result<Arc<dyn TickSource>, ConfigError> {
        let ctor = self.inner.resolve(&config.backend)?;
        ctor(config, trade_type)
    }
}

impl Default for DataBackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
