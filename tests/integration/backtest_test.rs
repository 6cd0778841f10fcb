//! End-to-end backtest tests

use backtester::backtest::{BacktestError, Backtester};
use backtester::config::{Config, RunContext};
use backtester::data::{write_ticks, MemorySource, SyntheticSeries, TickSource};
use backtester::execution::Order;
use backtester::feed::{Tick, TradeType};
use backtester::saver::SaverFactory;
use backtester::strategy::{
    Strategy, StrategyContext, StrategyError, StrategyParams, StrategyRegistry,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2011, 1, 3, 0, 0, 0).unwrap()
}

fn lists(lines: &[&str]) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|l| l.split_whitespace().map(str::to_string).collect())
        .collect()
}

fn params(toml: &str) -> StrategyParams {
    toml::from_str(toml).unwrap()
}

fn synthetic(symbols: &[&str], bars: usize) -> MemorySource {
    let series = SyntheticSeries {
        start: t0(),
        bars,
        start_price: dec!(100),
        trade_type: TradeType::Quote,
    };
    let mut source = MemorySource::new();
    for symbol in symbols {
        source.insert(*symbol, series.generate(symbol));
    }
    source
}

fn backtester(
    ctx: RunContext,
    source: impl TickSource + 'static,
    registry: &StrategyRegistry,
    symbol_lists: Vec<Vec<String>>,
) -> Backtester {
    Backtester::new(
        ctx,
        Arc::new(source),
        registry,
        SaverFactory::noop(),
        symbol_lists,
    )
    .unwrap()
}

#[tokio::test]
async fn test_single_buy_scenario() {
    let source = MemorySource::new().with_series(
        "AAPL",
        vec![Tick::trade("AAPL", t0(), dec!(100.0), dec!(1))],
    );
    let mut ctx = RunContext::new("period", params("quantity = 10"));
    ctx.initial_cash = dec!(200000);

    let mut bt = backtester(ctx, source, &StrategyRegistry::default(), lists(&["AAPL"]));
    assert_eq!(bt.run_all(std::future::pending()).await.unwrap(), 1);

    let account = &bt.accounts()[0];
    assert_eq!(account.cash, dec!(199000));
    assert_eq!(account.held("AAPL"), dec!(10));
    assert_eq!(account.orders.len(), 1);
    assert_eq!(account.equity(), dec!(200000));
}

#[tokio::test]
async fn test_batch_continues_after_failed_run() {
    let source = synthetic(&["AAPL", "MSFT"], 30);
    let ctx = RunContext::new("period", params("period = 5"));

    let mut bt = backtester(
        ctx,
        source,
        &StrategyRegistry::default(),
        lists(&["AAPL", "NOPE", "MSFT"]),
    );
    let completed = bt.run_all(std::future::pending()).await.unwrap();

    assert_eq!(completed, 2);
    assert_eq!(bt.failures().len(), 1);
    assert_eq!(bt.failures()[0].symbols, vec!["NOPE".to_string()]);
    assert!(bt.failures()[0].error.contains("NOPE"));

    let report = bt.report();
    assert_eq!(report.summary.run_count, 2);
    assert_eq!(report.runs[0].symbols, vec!["AAPL".to_string()]);
    assert_eq!(report.runs[1].symbols, vec!["MSFT".to_string()]);
}

#[tokio::test]
async fn test_multi_symbol_run_conserves_value() {
    let source = synthetic(&["AAPL", "MSFT", "GOOG"], 120);
    let mut ctx = RunContext::new(
        "sma",
        params("short_window = 3\nlong_window = 8\nquantity = 50"),
    );
    ctx.fee_rate = dec!(0.001);

    let mut bt = backtester(
        ctx,
        source,
        &StrategyRegistry::default(),
        lists(&["AAPL MSFT GOOG"]),
    );
    bt.run_all(std::future::pending()).await.unwrap();

    let account = &bt.accounts()[0];
    assert!(!account.orders.is_empty());
    assert!(account.fees_paid > Decimal::ZERO);

    let book: Decimal = account
        .positions
        .values()
        .map(|p| p.quantity * p.cost_basis)
        .sum();
    assert_eq!(
        account.cash + book,
        account.initial_cash + account.realized_pnl - account.fees_paid
    );
    assert_eq!(account.equity_curve.len(), 120);
}

#[tokio::test]
async fn test_start_dates_limit_replay_and_trading() {
    let source = synthetic(&["AAPL"], 20);
    let mut ctx = RunContext::new("period", params("period = 1"));
    ctx.start_tick_date = Some(t0() + Duration::days(5));
    ctx.window.start = Some(t0() + Duration::days(10));

    let mut bt = backtester(ctx, source, &StrategyRegistry::default(), lists(&["AAPL"]));
    bt.run_all(std::future::pending()).await.unwrap();

    let account = &bt.accounts()[0];
    assert_eq!(account.equity_curve.len(), 15);
    assert_eq!(account.orders.len(), 10);
    assert!(account
        .orders
        .iter()
        .all(|o| o.timestamp >= t0() + Duration::days(10)));
}

#[tokio::test]
async fn test_latest_orders_across_accounts() {
    let source = synthetic(&["AAPL", "MSFT"], 10);
    let ctx = RunContext::new("period", params("period = 1"));

    let mut bt = backtester(
        ctx,
        source,
        &StrategyRegistry::default(),
        lists(&["AAPL", "MSFT"]),
    );
    bt.run_all(std::future::pending()).await.unwrap();

    let latest = bt.latest_orders(3);
    assert_eq!(latest.len(), 6);
    assert!(latest[..3].iter().all(|o| o.symbol == "AAPL"));
    assert!(latest[3..].iter().all(|o| o.symbol == "MSFT"));
    assert_eq!(latest[2].timestamp, t0() + Duration::days(9));
}

/// Fails on the third tick
struct Flaky {
    symbols: Vec<String>,
    ticks: usize,
}

impl Strategy for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn on_tick(
        &mut self,
        _tick: &Tick,
        _ctx: &StrategyContext<'_>,
    ) -> Result<Vec<Order>, StrategyError> {
        self.ticks += 1;
        if self.ticks == 3 {
            return Err(StrategyError::Handler("lost track of the market".to_string()));
        }
        Ok(vec![])
    }
}

#[tokio::test]
async fn test_strategy_error_fails_run() {
    let mut registry = StrategyRegistry::empty();
    registry.register("flaky", |_, symbols| {
        Ok(Box::new(Flaky {
            symbols: symbols.to_vec(),
            ticks: 0,
        }))
    });
    let mut ctx = RunContext::new("flaky", StrategyParams::new());
    ctx.channel_capacity = 1;

    let mut bt = backtester(ctx, synthetic(&["AAPL"], 200), &registry, lists(&["AAPL"]));
    let completed = bt.run_all(std::future::pending()).await.unwrap();

    assert_eq!(completed, 0);
    let failure = &bt.failures()[0];
    assert!(failure.error.contains("flaky"));
    assert!(failure.error.contains("lost track of the market"));
    assert_eq!(bt.report().summary.run_count, 0);
}

/// Signals `notify` on its first tick
struct Tripwire {
    symbols: Vec<String>,
    notify: Arc<Notify>,
}

impl Strategy for Tripwire {
    fn name(&self) -> &str {
        "tripwire"
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn on_tick(
        &mut self,
        _tick: &Tick,
        _ctx: &StrategyContext<'_>,
    ) -> Result<Vec<Order>, StrategyError> {
        self.notify.notify_one();
        Ok(vec![])
    }
}

#[tokio::test]
async fn test_interrupt_during_run_stops_batch() {
    let notify = Arc::new(Notify::new());
    let mut registry = StrategyRegistry::empty();
    let trip = Arc::clone(&notify);
    registry.register("tripwire", move |_, symbols| {
        let notify = if symbols[0] == "MSFT" {
            Arc::clone(&trip)
        } else {
            Arc::new(Notify::new())
        };
        Ok(Box::new(Tripwire {
            symbols: symbols.to_vec(),
            notify,
        }))
    });
    let mut ctx = RunContext::new("tripwire", StrategyParams::new());
    ctx.channel_capacity = 1;

    let source = synthetic(&["AAPL", "MSFT", "GOOG"], 5000);
    let mut bt = backtester(ctx, source, &registry, lists(&["AAPL", "MSFT", "GOOG"]));

    let err = bt
        .run_all(async move { notify.notified().await })
        .await
        .unwrap_err();

    assert!(matches!(err, BacktestError::Interrupted { completed: 1 }));
    assert_eq!(bt.accounts().len(), 1);
    assert!(bt.failures().is_empty());
}

#[tokio::test]
async fn test_parquet_end_to_end() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let out_dir = dir.path().join("out");

    let series = SyntheticSeries {
        start: t0(),
        bars: 60,
        start_price: dec!(50),
        trade_type: TradeType::Quote,
    };
    for symbol in ["AAPL", "MSFT"] {
        let path = data_dir.join(format!("{symbol}.parquet"));
        write_ticks(&path, &series.generate(symbol), TradeType::Quote).unwrap();
    }

    std::fs::write(dir.path().join("symbols.txt"), "AAPL\n\nAAPL MSFT\nAAPL\n").unwrap();
    let config_path = dir.path().join("backtest.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
            [backtest]
            symbol_file = "symbols.txt"
            initial_cash = 100000

            [data]
            backend = "parquet"
            path = "{}"

            [saver]
            backend = "parquet"
            path = "{}"

            [strategy]
            name = "sma"

            [strategy.params]
            short_window = 3
            long_window = 10
            quantity = 20
            "#,
            data_dir.display(),
            out_dir.display()
        ),
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    let mut bt = Backtester::from_config(&config, &config_path).unwrap();
    assert_eq!(bt.symbol_lists().len(), 2);

    assert_eq!(bt.run_all(std::future::pending()).await.unwrap(), 2);
    assert!(bt.failures().is_empty());

    assert!(out_dir.join("AAPL_sma_equity.parquet").exists());
    assert!(out_dir.join("2_sma_equity.parquet").exists());

    let report = bt.report();
    assert_eq!(report.summary.run_count, 2);
    assert_eq!(report.runs[0].start_value, dec!(100000));
    assert_eq!(report.runs[0].points, 60);
}
