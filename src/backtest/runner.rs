//! Single-run coordinator

use super::BacktestError;
use crate::account::{Account, AccountStore};
use crate::config::RunContext;
use crate::data::TickSource;
use crate::engine::{Dispatcher, DispatcherExit, EngineError};
use crate::execution::OrderExecutor;
use crate::feed::TickFeeder;
use crate::saver::SaverFactory;
use crate::strategy::StrategyCtor;
use std::sync::Arc;

/// Outcome of one successful run
#[derive(Debug)]
pub struct RunResult {
    pub run_name: String,
    /// The run's account after the dispatcher stopped
    pub account: Account,
    pub ticks_processed: usize,
    pub orders_filled: usize,
    pub orders_rejected: usize,
}

/// Name used for saver output: the symbol for single-symbol runs, the
/// symbol count otherwise, followed by the strategy name
pub fn run_name(symbols: &[String], strategy: &str) -> String {
    match symbols {
        [symbol] => format!("{symbol}_{strategy}"),
        _ => format!("{}_{strategy}", symbols.len()),
    }
}

/// Wires feeder, dispatcher, executor and account store for each run
pub struct RunCoordinator {
    ctx: RunContext,
    source: Arc<dyn TickSource>,
    strategy: StrategyCtor,
    saver: SaverFactory,
}

impl RunCoordinator {
    pub fn new(
        ctx: RunContext,
        source: Arc<dyn TickSource>,
        strategy: StrategyCtor,
        saver: SaverFactory,
    ) -> Self {
        Self {
            ctx,
            source,
            strategy,
            saver,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Build the strategy for `symbols` without running it
    pub fn check_strategy(&self, symbols: &[String]) -> Result<(), BacktestError> {
        (self.strategy)(&self.ctx.strategy_params, symbols)?;
        Ok(())
    }

    /// Backtest `symbols` from setup to the joined dispatcher
    pub async fn run(&self, symbols: &[String]) -> Result<RunResult, BacktestError> {
        let feeder = TickFeeder::load(self.source.as_ref(), symbols, self.ctx.start_tick_date)
            .await?;

        let mut store = AccountStore::new();
        let account_id = store.create_account(self.ctx.initial_cash);

        let symbols = feeder.symbols();
        let strategy = (self.strategy)(&self.ctx.strategy_params, symbols)?;
        let run_name = run_name(symbols, strategy.name());

        let executor = OrderExecutor::new(self.ctx.window, self.ctx.pricer())
            .with_fee_rate(self.ctx.fee_rate)
            .with_short_selling(self.ctx.allow_short);

        let mut dispatcher = Dispatcher::new(store, executor, feeder.market_data())
            .with_saver(self.saver.create(&run_name));
        dispatcher.register(strategy, account_id)?;

        tracing::info!(run = %run_name, %account_id, "Starting run");
        let handle = dispatcher.spawn(self.ctx.channel_capacity);

        // A closed channel means the dispatcher failed; the join reports why
        let fed = feeder.feed(handle.sender()).await;
        handle.stop();

        let mut report = match handle.join(self.ctx.join_timeout).await {
            DispatcherExit::Stopped(report) => report,
            DispatcherExit::Failed { failure, .. } => return Err(failure.into()),
            DispatcherExit::Panicked(panic) => return Err(panic.into()),
            DispatcherExit::TimedOut(timeout) => {
                return Err(BacktestError::ShutdownTimeout { timeout })
            }
        };
        let emitted = fed?;

        if let Some(e) = report.saver_error.take() {
            return Err(e.into());
        }

        let account = report
            .store
            .take(account_id)
            .ok_or(EngineError::UnknownAccount(account_id))?;

        tracing::info!(
            run = %run_name,
            ticks = emitted,
            filled = report.orders_filled,
            rejected = report.orders_rejected,
            "{account}"
        );

        Ok(RunResult {
            run_name,
            account,
            ticks_processed: report.ticks_processed,
            orders_filled: report.orders_filled,
            orders_rejected: report.orders_rejected,
        })
    }
}
