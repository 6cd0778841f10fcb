//! State saver module
//!
//! Optional persistence of orders and equity produced by a run

mod parquet;

pub use self::parquet::{equity_schema, order_schema, ParquetStateSaver};

use crate::account::{AccountId, EquityPoint};
use crate::config::{ConfigError, SaverConfig};
use crate::execution::Order;
use crate::registry::Registry;
use std::path::PathBuf;
use thiserror::Error;

/// State saver errors
#[derive(Debug, Error)]
pub enum SaverError {
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
}

/// Trait for run state persistence backends.
///
/// Recording happens on the dispatcher's hot path and only buffers;
/// `commit` runs once when the dispatcher stops.
pub trait StateSaver: Send {
    fn record_order(&mut self, order: &Order);
    fn record_equity(&mut self, account: AccountId, point: EquityPoint);
    fn commit(&mut self) -> Result<(), SaverError>;
}

/// Saver used when none is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSaver;

impl StateSaver for NoopSaver {
    fn record_order(&mut self, _order: &Order) {}

    fn record_equity(&mut self, _account: AccountId, _point: EquityPoint) {}

    fn commit(&mut self) -> Result<(), SaverError> {
        Ok(())
    }
}

/// Builds a saver for one run from the `[saver]` section
pub type SaverCtor = fn(&SaverConfig, &str) -> Box<dyn StateSaver>;

/// Savers selectable by name from configuration
pub struct SaverRegistry {
    inner: Registry<SaverCtor>,
}

impl SaverRegistry {
    /// Registry with `none` and `parquet`
    pub fn with_builtins() -> Self {
        let mut inner: Registry<SaverCtor> = Registry::new("saver");
        inner
            .register("none", |_, _| Box::new(NoopSaver))
            .register("parquet", |config, run| {
                Box::new(ParquetStateSaver::new(config.path.clone(), run))
            });
        Self { inner }
    }

    pub fn register(&mut self, name: impl Into<String>, ctor: SaverCtor) -> &mut Self {
        self.inner.register(name, ctor);
        self
    }

    /// Validate the configured backend name and bind it to its settings
    pub fn resolve(&self, config: &SaverConfig) -> Result<SaverFactory, ConfigError> {
        let ctor = *self.inner.resolve(&config.backend)?;
        Ok(SaverFactory {
            ctor,
            config: config.clone(),
        })
    }
}

impl Default for SaverRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Resolved saver backend producing one saver per run
#[derive(Clone)]
pub struct SaverFactory {
    ctor: SaverCtor,
    config: SaverConfig,
}

impl SaverFactory {
    /// Factory producing [`NoopSaver`]s
    pub fn noop() -> Self {
        Self {
            ctor: |_, _| Box::new(NoopSaver),
            config: SaverConfig::default(),
        }
    }

    pub fn backend(&self) -> &str {
        &self.config.backend
    }

    pub fn create(&self, run_name: &str) -> Box<dyn StateSaver> {
        (self.ctor)(&self.config, run_name)
    }
}
