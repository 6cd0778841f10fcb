//! Backtest command implementation

use crate::backtest::{Backtester, BatchReport, RunFailure};
use crate::config::Config;
use crate::execution::Order;
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::Path;

/// Report output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct BacktestArgs {
    /// Replay ticks from this time (RFC 3339), overriding the config
    #[arg(long)]
    pub start_tick: Option<DateTime<Utc>>,

    /// Accept orders from this time (RFC 3339), overriding the config
    #[arg(long)]
    pub start_trade: Option<DateTime<Utc>>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Orders listed per account after the batch
    #[arg(long)]
    pub latest_orders: Option<usize>,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    report: BatchReport,
    failures: &'a [RunFailure],
    latest_orders: Vec<&'a Order>,
}

impl BacktestArgs {
    /// Apply command-line overrides to the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(start) = self.start_tick {
            config.backtest.start_tick_date = Some(start);
        }
        if let Some(start) = self.start_trade {
            config.backtest.start_trade_date = Some(start);
        }
        if let Some(n) = self.latest_orders {
            config.backtest.latest_orders = n;
        }
    }

    pub async fn execute(&self, mut config: Config, config_path: &Path) -> anyhow::Result<()> {
        self.apply(&mut config);

        let mut backtester = Backtester::from_config(&config, config_path)?;
        tracing::info!(
            runs = backtester.symbol_lists().len(),
            strategy = %config.strategy.name,
            "Starting backtest"
        );

        let shutdown = async {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("Could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };
        backtester.run_all(shutdown).await?;

        let n = config.backtest.latest_orders;
        match self.format {
            OutputFormat::Json => {
                let output = JsonOutput {
                    report: backtester.report(),
                    failures: backtester.failures(),
                    latest_orders: backtester.latest_orders(n),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("{}", backtester.report().format_table());
                for account in backtester.accounts() {
                    println!("{account}");
                }
                if !backtester.failures().is_empty() {
                    println!("\nFAILED RUNS");
                    for failure in backtester.failures() {
                        println!("  [{}] {}", failure.symbols.join(" "), failure.error);
                    }
                }
                println!("\nLATEST ORDERS");
                for order in backtester.latest_orders(n) {
                    println!(
                        "  {} {} {:?} {} @ {}",
                        order.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        order.symbol,
                        order.side,
                        order.quantity,
                        order.fill_price.unwrap_or(order.price),
                    );
                }
            }
        }

        Ok(())
    }
}
