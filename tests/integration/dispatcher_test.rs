//! Integration tests for the dispatcher task

use backtester::account::{AccountId, AccountStore};
use backtester::data::MemorySource;
use backtester::engine::{Dispatcher, DispatcherExit, DispatcherState};
use backtester::execution::{Order, OrderExecutor};
use backtester::feed::{Tick, TickFeeder};
use backtester::history::MarketData;
use backtester::strategy::{Strategy, StrategyContext, StrategyError};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

const JOIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

type Seen = Arc<Mutex<Vec<(String, DateTime<Utc>)>>>;

/// Records every tick it receives
struct Counting {
    symbols: Vec<String>,
    seen: Seen,
}

impl Strategy for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn on_tick(
        &mut self,
        tick: &Tick,
        ctx: &StrategyContext<'_>,
    ) -> Result<Vec<Order>, StrategyError> {
        assert_eq!(ctx.now, tick.timestamp);
        self.seen
            .lock()
            .unwrap()
            .push((tick.symbol.clone(), tick.timestamp));
        Ok(vec![])
    }
}

/// Logs its tag on every tick
struct Tagged {
    tag: &'static str,
    symbols: Vec<String>,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Strategy for Tagged {
    fn name(&self) -> &str {
        self.tag
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn on_tick(
        &mut self,
        _tick: &Tick,
        _ctx: &StrategyContext<'_>,
    ) -> Result<Vec<Order>, StrategyError> {
        self.log.lock().unwrap().push(self.tag);
        Ok(vec![])
    }
}

/// Blocks its worker on every tick
struct Sleeping {
    symbols: Vec<String>,
}

impl Strategy for Sleeping {
    fn name(&self) -> &str {
        "sleeping"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn on_tick(
        &mut self,
        _tick: &Tick,
        _ctx: &StrategyContext<'_>,
    ) -> Result<Vec<Order>, StrategyError> {
        std::thread::sleep(std::time::Duration::from_millis(500));
        Ok(vec![])
    }
}

/// Panics on the first tick
struct Panicking {
    symbols: Vec<String>,
}

impl Strategy for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn on_tick(
        &mut self,
        _tick: &Tick,
        _ctx: &StrategyContext<'_>,
    ) -> Result<Vec<Order>, StrategyError> {
        panic!("strategy exploded");
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2011, 1, 3, 0, 0, 0).unwrap()
}

fn symbols() -> Vec<String> {
    vec!["AAPL".to_string(), "MSFT".to_string(), "GOOG".to_string()]
}

/// Interleaved series with shared timestamps across symbols
fn source() -> MemorySource {
    let mut source = MemorySource::new();
    for (offset, symbol) in symbols().iter().enumerate() {
        let ticks = (0..40)
            .filter(|i| (i + offset) % 3 != 0)
            .map(|i| {
                Tick::trade(
                    symbol.as_str(),
                    t0() + Duration::hours(i as i64),
                    Decimal::from(10 + i),
                    dec!(1),
                )
            })
            .collect();
        source.insert(symbol.as_str(), ticks);
    }
    source
}

fn dispatcher(market: Arc<MarketData>) -> (Dispatcher, AccountId) {
    let mut store = AccountStore::new();
    let id = store.create_account(dec!(1000));
    (Dispatcher::new(store, OrderExecutor::default(), market), id)
}

#[tokio::test]
async fn test_dispatch_follows_feed_order() {
    let feeder = TickFeeder::load(&source(), &symbols(), None).await.unwrap();
    let expected: Vec<(String, DateTime<Utc>)> = feeder
        .ticks()
        .map(|t| (t.symbol.clone(), t.timestamp))
        .collect();

    let seen = Seen::default();
    let (mut dispatcher, id) = dispatcher(feeder.market_data());
    dispatcher
        .register(
            Box::new(Counting {
                symbols: symbols(),
                seen: Arc::clone(&seen),
            }),
            id,
        )
        .unwrap();

    // Capacity 1 forces the feeder to wait on the dispatcher constantly
    let handle = dispatcher.spawn(1);
    let emitted = feeder.feed(handle.sender()).await.unwrap();
    handle.stop();

    let DispatcherExit::Stopped(report) = handle.join(JOIN_TIMEOUT).await else {
        panic!("dispatcher did not stop cleanly");
    };

    assert_eq!(report.ticks_processed, emitted);
    assert_eq!(*seen.lock().unwrap(), expected);
    assert!(expected.windows(2).all(|w| w[0].1 <= w[1].1));
}

#[tokio::test]
async fn test_registration_order_within_a_tick() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    let (mut dispatcher, id) = dispatcher(Arc::new(MarketData::default()));
    for tag in ["first", "second", "third"] {
        dispatcher
            .register(
                Box::new(Tagged {
                    tag,
                    symbols: vec!["AAPL".to_string()],
                    log: Arc::clone(&log),
                }),
                id,
            )
            .unwrap();
    }

    let handle = dispatcher.spawn(4);
    for i in 0..2 {
        handle
            .sender()
            .send(Tick::trade("AAPL", t0() + Duration::days(i), dec!(10), dec!(1)))
            .await
            .unwrap();
    }
    handle.stop();

    assert!(matches!(
        handle.join(JOIN_TIMEOUT).await,
        DispatcherExit::Stopped(_)
    ));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["first", "second", "third", "first", "second", "third"]
    );
}

#[tokio::test]
async fn test_stop_before_first_tick() {
    let (dispatcher, _) = dispatcher(Arc::new(MarketData::default()));
    let handle = dispatcher.spawn(8);
    handle.stop();

    let DispatcherExit::Stopped(report) = handle.join(JOIN_TIMEOUT).await else {
        panic!("dispatcher did not stop cleanly");
    };
    assert_eq!(report.ticks_processed, 0);
    assert_eq!(report.store.len(), 1);
}

#[tokio::test]
async fn test_queued_ticks_drain_after_stop() {
    let (mut dispatcher, id) = dispatcher(Arc::new(MarketData::default()));
    let seen = Seen::default();
    dispatcher
        .register(
            Box::new(Counting {
                symbols: vec!["AAPL".to_string()],
                seen: Arc::clone(&seen),
            }),
            id,
        )
        .unwrap();

    let handle = dispatcher.spawn(16);
    for i in 0..10 {
        handle
            .sender()
            .send(Tick::trade("AAPL", t0() + Duration::minutes(i), dec!(5), dec!(1)))
            .await
            .unwrap();
    }
    handle.stop();

    let mut states = handle.subscribe_state();
    states
        .wait_for(|s| *s == DispatcherState::Stopped)
        .await
        .unwrap();

    let DispatcherExit::Stopped(report) = handle.join(JOIN_TIMEOUT).await else {
        panic!("dispatcher did not stop cleanly");
    };
    assert_eq!(report.ticks_processed, 10);
    assert_eq!(seen.lock().unwrap().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_join_times_out_and_aborts() {
    let (mut dispatcher, id) = dispatcher(Arc::new(MarketData::default()));
    dispatcher
        .register(
            Box::new(Sleeping {
                symbols: vec!["AAPL".to_string()],
            }),
            id,
        )
        .unwrap();

    let handle = dispatcher.spawn(4);
    handle
        .sender()
        .send(Tick::trade("AAPL", t0(), dec!(5), dec!(1)))
        .await
        .unwrap();
    handle.stop();

    let timeout = std::time::Duration::from_millis(20);
    let exit = handle.join(timeout).await;
    assert!(matches!(exit, DispatcherExit::TimedOut(t) if t == timeout));
}

#[tokio::test]
async fn test_panicking_strategy_reported() {
    let (mut dispatcher, id) = dispatcher(Arc::new(MarketData::default()));
    dispatcher
        .register(
            Box::new(Counting {
                symbols: vec!["AAPL".to_string(), "MSFT".to_string()],
                seen: Seen::default(),
            }),
            id,
        )
        .unwrap();
    dispatcher
        .register(
            Box::new(Panicking {
                symbols: vec!["AAPL".to_string()],
            }),
            id,
        )
        .unwrap();

    let handle = dispatcher.spawn(4);
    handle
        .sender()
        .send(Tick::trade("AAPL", t0(), dec!(5), dec!(1)))
        .await
        .unwrap();
    handle.stop();

    let DispatcherExit::Panicked(panic) = handle.join(JOIN_TIMEOUT).await else {
        panic!("expected a panic report");
    };
    assert!(panic.message.contains("strategy exploded"));
    assert_eq!(panic.strategy.as_deref(), Some("panicking"));
    assert_eq!(panic.symbols, vec!["AAPL".to_string()]);
    assert!(panic
        .to_string()
        .contains("in strategy panicking on [AAPL]"));
}
