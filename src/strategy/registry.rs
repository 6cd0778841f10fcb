//! Strategy registry

use super::{PeriodStrategy, SmaStrategy, Strategy, StrategyError, StrategyParams};
use crate::config::ConfigError;
use crate::registry::Registry;
use std::sync::Arc;

/// Builds a strategy for one run's symbol list
pub type StrategyCtor = Arc<
    dyn Fn(&StrategyParams, &[String]) -> Result<Box<dyn Strategy>, StrategyError> + Send + Sync,
>;

/// Strategies selectable by name from configuration
pub struct StrategyRegistry {
    inner: Registry<StrategyCtor>,
}

impl StrategyRegistry {
    /// Registry without any strategy
    pub fn empty() -> Self {
        Self {
            inner: Registry::new("strategy"),
        }
    }

    /// Registry with the built-in strategies
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry
            .register(PeriodStrategy::NAME, PeriodStrategy::from_params)
            .register(SmaStrategy::NAME, SmaStrategy::from_params);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn(&StrategyParams, &[String]) -> Result<Box<dyn Strategy>, StrategyError>
            + Send
            + Sync
            + 'static,
    {
        self.inner.register(name, Arc::new(ctor));
        self
    }

    pub fn resolve(&self, name: &str) -> Result<StrategyCtor, ConfigError> {
        self.inner.resolve(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.inner.names()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
