//! CLI interface for the backtester
//!
//! Provides subcommands for:
//! - `backtest`: Run the configured strategy over every symbol list
//! - `generate`: Write synthetic Parquet data for the configured symbols
//! - `config`: Show the resolved configuration

mod backtest;
mod generate;

pub use backtest::{BacktestArgs, OutputFormat};
pub use generate::GenerateArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "backtester")]
#[command(about = "Replay historical ticks through trading strategies against simulated accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the backtest batch
    Backtest(BacktestArgs),
    /// Generate synthetic market data
    Generate(GenerateArgs),
    /// Show configuration
    Config,
}
