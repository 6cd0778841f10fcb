//! Configuration loading tests

use backtester::backtest::Backtester;
use backtester::config::{load_symbol_lists, Config, ConfigError, FillPriceMode, RunContext};
use backtester::feed::TradeType;
use rust_decimal_macros::dec;
use std::path::Path;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn config_text(data_dir: &Path, strategy: &str, saver: &str) -> String {
    format!(
        r#"
        [backtest]
        trade_type = "quote"
        initial_cash = 150000
        start_tick_date = "2010-10-10T00:00:00Z"
        start_trade_date = "2011-12-20T00:00:00Z"
        symbol_file = "symbols.txt"
        fill_price = "slippage"
        slippage_bps = 10

        [data]
        backend = "parquet"
        path = "{}"

        [saver]
        backend = "{saver}"

        [strategy]
        name = "{strategy}"
        "#,
        data_dir.display()
    )
}

#[test]
fn test_config_example_parses() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert_eq!(config.strategy.name, "period");
    assert!(RunContext::from_config(&config).is_ok());
}

#[test]
fn test_full_config_resolves_run_context() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "bt.toml", &config_text(dir.path(), "period", "none"));

    let config = assert_ok!(Config::load(&path));
    let ctx = assert_ok!(RunContext::from_config(&config));

    assert_eq!(ctx.trade_type, TradeType::Quote);
    assert_eq!(ctx.initial_cash, dec!(150000));
    assert_eq!(ctx.fill_price, FillPriceMode::Slippage);
    assert!(ctx.start_tick_date.is_some());
    assert!(ctx.window.start.is_some());
    assert_eq!(config.symbol_file_path(&path), dir.path().join("symbols.txt"));
}

#[test]
fn test_missing_symbol_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "bt.toml", &config_text(dir.path(), "period", "none"));
    let config = Config::load(&path).unwrap();

    let err = Backtester::from_config(&config, &path).err().unwrap();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_empty_symbol_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "bt.toml", &config_text(dir.path(), "period", "none"));
    write(dir.path(), "symbols.txt", "\n   \n");
    let config = Config::load(&path).unwrap();

    let err = Backtester::from_config(&config, &path).err().unwrap();
    assert!(matches!(err, ConfigError::EmptySymbolList(_)));
}

#[test]
fn test_unknown_components_are_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "symbols.txt", "AAPL\n");

    let path = write(dir.path(), "a.toml", &config_text(dir.path(), "martingale", "none"));
    let config = Config::load(&path).unwrap();
    let err = Backtester::from_config(&config, &path).err().unwrap();
    assert!(err.to_string().contains("unknown strategy 'martingale'"));

    let path = write(dir.path(), "b.toml", &config_text(dir.path(), "period", "mysql"));
    let config = Config::load(&path).unwrap();
    let err = Backtester::from_config(&config, &path).err().unwrap();
    assert!(err.to_string().contains("unknown saver 'mysql'"));
}

#[test]
fn test_symbol_lists_skip_blank_and_duplicate_lines() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "symbols.txt", "AAPL MSFT\n\nGOOG\n\tAAPL  MSFT \n");

    let lists = load_symbol_lists(&path).unwrap();
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0], vec!["AAPL", "MSFT"]);
    assert_eq!(lists[1], vec!["GOOG"]);
}

#[test]
fn test_malformed_config_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "bt.toml", "[backtest\nsymbol_file = 1");

    let err = assert_err!(Config::load(&path));
    assert!(matches!(err, ConfigError::Parse(_)));
}
