//! Batch execution: one run per symbol list

use super::{BacktestError, BatchReport, MetricsAggregator, RunCoordinator};
use crate::account::Account;
use crate::config::{load_symbol_lists, Config, ConfigError, RunContext};
use crate::data::{DataBackendRegistry, TickSource};
use crate::execution::Order;
use crate::saver::{SaverFactory, SaverRegistry};
use crate::strategy::StrategyRegistry;
use crate::telemetry::{increment, CounterMetric};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;

/// A run that ended with an error
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    pub symbols: Vec<String>,
    pub error: String,
}

/// Runs every symbol list in turn and keeps what the runs produce
pub struct Backtester {
    coordinator: RunCoordinator,
    symbol_lists: Vec<Vec<String>>,
    metrics: MetricsAggregator,
    accounts: Vec<Account>,
    failures: Vec<RunFailure>,
}

impl Backtester {
    /// Validate the strategy against the first symbol list and prepare
    /// the batch. Invalid strategy parameters fail here, before any run.
    pub fn new(
        ctx: RunContext,
        source: Arc<dyn TickSource>,
        strategies: &StrategyRegistry,
        saver: SaverFactory,
        symbol_lists: Vec<Vec<String>>,
    ) -> Result<Self, ConfigError> {
        let Some(first) = symbol_lists.first() else {
            return Err(ConfigError::Invalid {
                field: "symbol_file",
                message: "no symbol lists to run".to_string(),
            });
        };

        let strategy = strategies.resolve(&ctx.strategy_name)?;
        let coordinator = RunCoordinator::new(ctx, source, strategy, saver);
        coordinator
            .check_strategy(first)
            .map_err(|e| ConfigError::Invalid {
                field: "strategy.params",
                message: e.to_string(),
            })?;

        Ok(Self {
            coordinator,
            symbol_lists,
            metrics: MetricsAggregator::new(),
            accounts: vec![],
            failures: vec![],
        })
    }

    /// Resolve every configured component with the built-in registries
    pub fn from_config(config: &Config, config_path: &Path) -> Result<Self, ConfigError> {
        let ctx = RunContext::from_config(config)?;
        let source = DataBackendRegistry::default().build(&config.data, ctx.trade_type)?;
        let saver = SaverRegistry::default().resolve(&config.saver)?;
        let symbol_lists = load_symbol_lists(config.symbol_file_path(config_path))?;

        Self::new(
            ctx,
            source,
            &StrategyRegistry::default(),
            saver,
            symbol_lists,
        )
    }

    pub fn symbol_lists(&self) -> &[Vec<String>] {
        &self.symbol_lists
    }

    /// Run every symbol list until done or until `shutdown` resolves.
    ///
    /// A failed run is logged and recorded and the batch moves on. Returns
    /// the number of completed runs.
    pub async fn run_all(
        &mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<usize, BacktestError> {
        tokio::pin!(shutdown);

        let total = self.symbol_lists.len();
        for (index, symbols) in self.symbol_lists.iter().enumerate() {
            let span = tracing::info_span!(
                "run",
                symbols = %symbols.join(" "),
                run = index + 1,
                of = total
            );

            let result = tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::warn!(completed = self.accounts.len(), "Interrupted, aborting batch");
                    return Err(BacktestError::Interrupted {
                        completed: self.accounts.len(),
                    });
                }
                result = self.coordinator.run(symbols).instrument(span.clone()) => result,
            };

            match result {
                Ok(run) => {
                    self.metrics.record(symbols, &run.account.equity_curve);
                    self.accounts.push(run.account);
                    increment(CounterMetric::RunsCompleted, 1);
                }
                Err(e) => {
                    tracing::error!(parent: &span, error = %e, "Run failed");
                    increment(CounterMetric::RunsFailed, 1);
                    self.failures.push(RunFailure {
                        symbols: symbols.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            completed = self.accounts.len(),
            failed = self.failures.len(),
            "Batch finished"
        );
        Ok(self.accounts.len())
    }

    /// Metrics of every completed run
    pub fn report(&self) -> BatchReport {
        self.metrics.report()
    }

    /// Accounts of completed runs, in run order
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn failures(&self) -> &[RunFailure] {
        &self.failures
    }

    /// The last `n` orders of every completed account, account by account
    pub fn latest_orders(&self, n: usize) -> Vec<&Order> {
        self.accounts
            .iter()
            .flat_map(|a| a.latest_orders(n))
            .collect()
    }
}
