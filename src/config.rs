//! Configuration types for the backtester

use crate::execution::{FillPricer, RequestedPrice, SlippageBps, TradingWindow};
use crate::feed::TradeType;
use crate::strategy::StrategyParams;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration and input errors. Always fatal before any run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("symbol file {0} contains no symbols")]
    EmptySymbolList(PathBuf),
    #[error("unknown {kind} '{name}' (known: {known})")]
    UnknownComponent {
        kind: &'static str,
        name: String,
        known: String,
    },
    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub backtest: BacktestConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub saver: SaverConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Simulation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub trade_type: TradeType,
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,
    /// Ticks before this time are loaded as history but not replayed
    pub start_tick_date: Option<DateTime<Utc>>,
    /// Orders before this time are rejected
    pub start_trade_date: Option<DateTime<Utc>>,
    /// Orders at or after this time are rejected
    pub end_trade_date: Option<DateTime<Utc>>,
    /// Symbol list file, relative to the config file
    pub symbol_file: PathBuf,
    #[serde(default = "default_join_timeout_secs")]
    pub join_timeout_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub allow_short: bool,
    #[serde(default)]
    pub fee_rate: Decimal,
    #[serde(default)]
    pub fill_price: FillPriceMode,
    #[serde(default)]
    pub slippage_bps: Decimal,
    /// Orders per account listed after a batch
    #[serde(default = "default_latest_orders")]
    pub latest_orders: usize,
}

/// How accepted orders are priced
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FillPriceMode {
    /// Fill at the requested price
    #[default]
    Requested,
    /// Requested price moved `slippage_bps` against the trader
    Slippage,
}

/// Historical data backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    pub backend: String,
    pub path: PathBuf,
}

/// Result persistence backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaverConfig {
    #[serde(default = "default_saver_backend")]
    pub backend: String,
    #[serde(default = "default_saver_path")]
    pub path: PathBuf,
}

impl Default for SaverConfig {
    fn default() -> Self {
        Self {
            backend: default_saver_backend(),
            path: default_saver_path(),
        }
    }
}

/// Strategy selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default)]
    pub params: StrategyParams,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormatConfig,
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormatConfig::default(),
            metrics_port: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    #[default]
    Pretty,
    Json,
}

fn default_initial_cash() -> Decimal {
    Decimal::from(200_000)
}
fn default_join_timeout_secs() -> u64 {
    60
}
fn default_channel_capacity() -> usize {
    1024
}
fn default_latest_orders() -> usize {
    10
}
fn default_saver_backend() -> String {
    "none".to_string()
}
fn default_saver_path() -> PathBuf {
    PathBuf::from("./output")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the symbol file against the directory of the config file
    pub fn symbol_file_path(&self, config_path: impl AsRef<Path>) -> PathBuf {
        let base = config_path
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        base.join(&self.backtest.symbol_file)
    }
}

/// Immutable settings shared by every component of a run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub trade_type: TradeType,
    pub initial_cash: Decimal,
    pub start_tick_date: Option<DateTime<Utc>>,
    pub window: TradingWindow,
    pub join_timeout: Duration,
    pub channel_capacity: usize,
    pub allow_short: bool,
    pub fee_rate: Decimal,
    pub fill_price: FillPriceMode,
    pub slippage_bps: Decimal,
    pub strategy_name: String,
    pub strategy_params: StrategyParams,
}

impl RunContext {
    /// Validate and resolve the backtest and strategy sections
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let bt = &config.backtest;

        if bt.initial_cash <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "initial_cash",
                message: format!("must be positive, got {}", bt.initial_cash),
            });
        }
        if bt.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "channel_capacity",
                message: "must be at least 1".to_string(),
            });
        }
        if bt.fee_rate < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "fee_rate",
                message: format!("must not be negative, got {}", bt.fee_rate),
            });
        }
        if bt.slippage_bps < Decimal::ZERO || bt.slippage_bps >= Decimal::from(10_000) {
            return Err(ConfigError::Invalid {
                field: "slippage_bps",
                message: format!("must be in [0, 10000), got {}", bt.slippage_bps),
            });
        }
        if bt.join_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "join_timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if let (Some(start), Some(end)) = (bt.start_trade_date, bt.end_trade_date) {
            if end <= start {
                return Err(ConfigError::Invalid {
                    field: "end_trade_date",
                    message: format!("{end} is not after start_trade_date {start}"),
                });
            }
        }

        Ok(Self {
            trade_type: bt.trade_type,
            initial_cash: bt.initial_cash,
            start_tick_date: bt.start_tick_date,
            window: TradingWindow::new(bt.start_trade_date, bt.end_trade_date),
            join_timeout: Duration::from_secs(bt.join_timeout_secs),
            channel_capacity: bt.channel_capacity,
            allow_short: bt.allow_short,
            fee_rate: bt.fee_rate,
            fill_price: bt.fill_price,
            slippage_bps: bt.slippage_bps,
            strategy_name: config.strategy.name.clone(),
            strategy_params: config.strategy.params.clone(),
        })
    }

    /// Context with defaults for everything but the strategy
    pub fn new(strategy_name: impl Into<String>, strategy_params: StrategyParams) -> Self {
        Self {
            trade_type: TradeType::default(),
            initial_cash: default_initial_cash(),
            start_tick_date: None,
            window: TradingWindow::default(),
            join_timeout: Duration::from_secs(default_join_timeout_secs()),
            channel_capacity: default_channel_capacity(),
            allow_short: false,
            fee_rate: Decimal::ZERO,
            fill_price: FillPriceMode::default(),
            slippage_bps: Decimal::ZERO,
            strategy_name: strategy_name.into(),
            strategy_params,
        }
    }

    pub fn pricer(&self) -> Box<dyn FillPricer> {
        match self.fill_price {
            FillPriceMode::Requested => Box::new(RequestedPrice),
            FillPriceMode::Slippage => Box::new(SlippageBps::new(self.slippage_bps)),
        }
    }
}

/// Load run symbol lists: one run per line, whitespace-separated symbols.
///
/// A symbol repeated on a line counts once. Blank lines and repeated
/// lines are skipped. A missing file or a file
/// without any symbols is an error.
pub fn load_symbol_lists(path: impl AsRef<Path>) -> Result<Vec<Vec<String>>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let lists = parse_symbol_lists(&content);
    if lists.is_empty() {
        return Err(ConfigError::EmptySymbolList(path.to_path_buf()));
    }

    tracing::info!(path = %path.display(), runs = lists.len(), "Loaded symbol lists");
    Ok(lists)
}

fn parse_symbol_lists(content: &str) -> Vec<Vec<String>> {
    let mut lists: Vec<Vec<String>> = vec![];
    for line in content.lines() {
        let mut symbols: Vec<String> = vec![];
        for token in line.split_whitespace() {
            if !symbols.iter().any(|s| s == token) {
                symbols.push(token.to_string());
            }
        }
        if !symbols.is_empty() && !lists.contains(&symbols) {
            lists.push(symbols);
        }
    }
    lists
}
