//! Tick dispatcher
//!
//! Consumes ticks on its own task, fans them out to the strategies
//! subscribed to each symbol and forwards the orders they return to the
//! executor.

use super::EngineError;
use crate::account::{AccountId, AccountStore};
use crate::execution::OrderExecutor;
use crate::feed::Tick;
use crate::history::MarketData;
use crate::saver::{NoopSaver, SaverError, StateSaver};
use crate::strategy::{Strategy, StrategyContext, StrategyError};
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

/// Dispatcher lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Idle,
    Listening,
    Stopping,
    Stopped,
}

/// A strategy error captured on the dispatcher task
#[derive(Debug, Error)]
#[error("strategy {strategy} on [{}] failed at {timestamp}: {source}", symbols.join(" "))]
pub struct StrategyFailure {
    pub strategy: String,
    pub symbols: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[source]
    pub source: StrategyError,
}

/// A panic on the dispatcher task, tied to the strategy that was running
/// when one was
#[derive(Debug)]
pub struct DispatcherPanic {
    pub message: String,
    pub strategy: Option<String>,
    pub symbols: Vec<String>,
}

impl fmt::Display for DispatcherPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.strategy {
            Some(strategy) => write!(
                f,
                "dispatcher panicked in strategy {strategy} on [{}]: {}",
                self.symbols.join(" "),
                self.message
            ),
            None => write!(f, "dispatcher panicked: {}", self.message),
        }
    }
}

impl std::error::Error for DispatcherPanic {}

/// What the dispatcher task hands back when it ends
#[derive(Debug)]
pub struct DispatcherReport {
    /// The account store, with every execution committed
    pub store: AccountStore,
    pub ticks_processed: usize,
    pub orders_filled: usize,
    pub orders_rejected: usize,
    /// Set when the state saver could not commit
    pub saver_error: Option<SaverError>,
}

/// How the dispatcher task ended, as observed by [`DispatcherHandle::join`]
#[derive(Debug)]
pub enum DispatcherExit {
    /// Stop was requested and every queued tick was dispatched
    Stopped(DispatcherReport),
    /// A strategy error ended the loop
    Failed {
        failure: StrategyFailure,
        report: DispatcherReport,
    },
    /// The task panicked and its state is lost
    Panicked(DispatcherPanic),
    /// The task did not stop in time and was aborted
    TimedOut(Duration),
}

/// No strategy handler is running
const IDLE: usize = usize::MAX;

struct Registration {
    strategy: Box<dyn Strategy>,
    account_id: AccountId,
    symbols: HashSet<String>,
}

/// The trading engine for one run.
///
/// Built and configured on the coordinator, then moved onto its own task
/// by [`Dispatcher::spawn`].
pub struct Dispatcher {
    store: AccountStore,
    executor: OrderExecutor,
    market: Arc<MarketData>,
    registrations: Vec<Registration>,
    saver: Box<dyn StateSaver>,
    state: watch::Sender<DispatcherState>,
    /// Index of the registration whose handler is running
    active: Arc<AtomicUsize>,
    ticks_processed: usize,
    orders_filled: usize,
    orders_rejected: usize,
}

impl Dispatcher {
    pub fn new(store: AccountStore, executor: OrderExecutor, market: Arc<MarketData>) -> Self {
        let (state, _) = watch::channel(DispatcherState::Idle);
        Self {
            store,
            executor,
            market,
            registrations: vec![],
            saver: Box::new(NoopSaver),
            state,
            active: Arc::new(AtomicUsize::new(IDLE)),
            ticks_processed: 0,
            orders_filled: 0,
            orders_rejected: 0,
        }
    }

    pub fn with_saver(mut self, saver: Box<dyn StateSaver>) -> Self {
        self.saver = saver;
        self
    }

    /// Register `strategy` to trade for `account_id`.
    ///
    /// Strategies receive ticks in registration order.
    pub fn register(
        &mut self,
        strategy: Box<dyn Strategy>,
        account_id: AccountId,
    ) -> Result<&mut Self, EngineError> {
        if self.store.account(account_id).is_none() {
            return Err(EngineError::UnknownAccount(account_id));
        }

        let symbols = strategy.symbols().iter().cloned().collect();
        tracing::debug!(
            strategy = strategy.name(),
            account = %account_id,
            "Strategy registered"
        );
        self.registrations.push(Registration {
            strategy,
            account_id,
            symbols,
        });
        Ok(self)
    }

    pub fn state(&self) -> DispatcherState {
        *self.state.borrow()
    }

    /// Start the receive loop on a new task.
    ///
    /// The tick channel holds at most `capacity` ticks; senders wait while
    /// it is full.
    pub fn spawn(self, capacity: usize) -> DispatcherHandle {
        let (ticks_tx, ticks_rx) = mpsc::channel(capacity);
        let (stop_tx, stop_rx) = watch::channel(false);
        let state = self.state.subscribe();
        let active = Arc::clone(&self.active);
        let handlers = self
            .registrations
            .iter()
            .map(|r| (r.strategy.name().to_string(), r.strategy.symbols().to_vec()))
            .collect();

        self.state.send_replace(DispatcherState::Listening);
        let task = tokio::spawn(self.run(ticks_rx, stop_rx));

        DispatcherHandle {
            ticks: ticks_tx,
            stop: stop_tx,
            state,
            active,
            handlers,
            task,
        }
    }

    async fn run(
        mut self,
        mut ticks: mpsc::Receiver<Tick>,
        mut stop: watch::Receiver<bool>,
    ) -> (DispatcherReport, Option<StrategyFailure>) {
        tracing::info!(
            strategies = self.registrations.len(),
            accounts = self.store.len(),
            "Dispatcher listening"
        );

        let mut failure = None;
        loop {
            tokio::select! {
                // Queued ticks always win over the stop signal
                biased;

                tick = ticks.recv() => match tick {
                    Some(tick) => {
                        if let Err(e) = self.dispatch(&tick) {
                            failure = Some(e);
                            break;
                        }
                    }
                    None => break,
                },

                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow_and_update() {
                        break;
                    }
                }
            }
        }

        self.state.send_replace(DispatcherState::Stopping);
        ticks.close();

        if failure.is_none() {
            failure = self.drain(&mut ticks).await;
        }
        if let Some(ref failure) = failure {
            tracing::error!(error = %failure, "Strategy failed, dispatcher stopping");
        }

        let saver_error = self.saver.commit().err();
        if let Some(ref e) = saver_error {
            tracing::error!(error = %e, "Failed to commit run state");
        }

        self.state.send_replace(DispatcherState::Stopped);
        tracing::info!(
            ticks = self.ticks_processed,
            filled = self.orders_filled,
            rejected = self.orders_rejected,
            "Dispatcher stopped"
        );

        let report = DispatcherReport {
            store: self.store,
            ticks_processed: self.ticks_processed,
            orders_filled: self.orders_filled,
            orders_rejected: self.orders_rejected,
            saver_error,
        };
        (report, failure)
    }

    /// Dispatch whatever is still queued after the channel was closed
    async fn drain(&mut self, ticks: &mut mpsc::Receiver<Tick>) -> Option<StrategyFailure> {
        let mut drained = 0;
        while let Some(tick) = ticks.recv().await {
            if let Err(e) = self.dispatch(&tick) {
                return Some(e);
            }
            drained += 1;
        }
        tracing::debug!(drained, "Dispatcher drained queued ticks");
        None
    }

    /// Dispatch one tick to every subscribed strategy
    fn dispatch(&mut self, tick: &Tick) -> Result<(), StrategyFailure> {
        self.store.mark(&tick.symbol, tick.price());

        for (index, registration) in self
            .registrations
            .iter_mut()
            .enumerate()
            .filter(|(_, r)| r.symbols.contains(&tick.symbol))
        {
            self.active.store(index, Ordering::Relaxed);
            let Some(account) = self.store.account(registration.account_id) else {
                continue;
            };
            let ctx = StrategyContext {
                account_id: registration.account_id,
                account,
                market: &self.market,
                now: tick.timestamp,
            };

            let orders = registration
                .strategy
                .on_tick(tick, &ctx)
                .map_err(|source| StrategyFailure {
                    strategy: registration.strategy.name().to_string(),
                    symbols: registration.strategy.symbols().to_vec(),
                    timestamp: tick.timestamp,
                    source,
                })?;

            for order in orders {
                let Some(account) = self.store.account_mut(registration.account_id) else {
                    continue;
                };
                match self.executor.execute(&order, account) {
                    Ok(filled) => {
                        self.orders_filled += 1;
                        increment(CounterMetric::OrdersFilled, 1);
                        self.saver.record_order(&filled);
                        registration.strategy.on_fill(&filled);
                    }
                    Err(reason) => {
                        self.orders_rejected += 1;
                        increment(CounterMetric::OrdersRejected, 1);
                        tracing::debug!(
                            strategy = registration.strategy.name(),
                            symbol = %order.symbol,
                            side = ?order.side,
                            %reason,
                            "Order rejected"
                        );
                        registration.strategy.on_rejection(&order, &reason);
                    }
                }
            }
        }
        self.active.store(IDLE, Ordering::Relaxed);

        for (account_id, point) in self.store.snapshot(tick.timestamp) {
            set_gauge(
                GaugeMetric::Equity,
                point.equity.to_f64().unwrap_or_default(),
            );
            self.saver.record_equity(account_id, point);
        }

        self.ticks_processed += 1;
        increment(CounterMetric::TicksDispatched, 1);
        Ok(())
    }
}

/// Coordinator side of a running dispatcher.
///
/// Dropping the handle aborts the task.
pub struct DispatcherHandle {
    ticks: mpsc::Sender<Tick>,
    stop: watch::Sender<bool>,
    state: watch::Receiver<DispatcherState>,
    active: Arc<AtomicUsize>,
    /// Name and symbols of each registration, by index
    handlers: Vec<(String, Vec<String>)>,
    task: JoinHandle<(DispatcherReport, Option<StrategyFailure>)>,
}

impl DispatcherHandle {
    /// Channel the feeder pushes ticks into
    pub fn sender(&self) -> &mpsc::Sender<Tick> {
        &self.ticks
    }

    pub fn state(&self) -> DispatcherState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<DispatcherState> {
        self.state.clone()
    }

    /// Request a stop. Ticks already queued are still dispatched.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Wait up to `timeout` for the task to end, aborting it otherwise
    pub async fn join(mut self, timeout: Duration) -> DispatcherExit {
        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok((report, None))) => DispatcherExit::Stopped(report),
            Ok(Ok((report, Some(failure)))) => DispatcherExit::Failed { failure, report },
            Ok(Err(e)) => DispatcherExit::Panicked(self.panic_report(e)),
            Err(_) => {
                self.task.abort();
                tracing::warn!(?timeout, "Dispatcher did not stop in time, aborted");
                DispatcherExit::TimedOut(timeout)
            }
        }
    }

    fn panic_report(&self, err: JoinError) -> DispatcherPanic {
        let active = self.active.load(Ordering::Relaxed);
        let (strategy, symbols) = match self.handlers.get(active) {
            Some((name, symbols)) => (Some(name.clone()), symbols.clone()),
            None => (None, vec![]),
        };
        DispatcherPanic {
            message: panic_message(err),
            strategy,
            symbols,
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "dispatcher task panicked".to_string()
    }
}
