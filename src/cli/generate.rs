//! Generate command implementation

use crate::config::{load_symbol_lists, Config};
use crate::data::{write_ticks, SyntheticSeries};
use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use clap::Args;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Output directory for Parquet files
    #[arg(short, long, default_value = "./data")]
    pub out: PathBuf,

    /// Bars per symbol
    #[arg(long, default_value = "500")]
    pub bars: usize,

    /// Price of the first bar
    #[arg(long, default_value = "100")]
    pub start_price: Decimal,

    /// Time of the first bar (RFC 3339)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,
}

impl GenerateArgs {
    /// Write one file per symbol named in the configured symbol file
    pub async fn execute(&self, config: &Config, config_path: &Path) -> anyhow::Result<()> {
        let lists = load_symbol_lists(config.symbol_file_path(config_path))?;
        let symbols: BTreeSet<&String> = lists.iter().flatten().collect();

        let start = match self.start {
            Some(start) => start,
            None => Utc
                .with_ymd_and_hms(2011, 1, 3, 0, 0, 0)
                .single()
                .context("invalid default start")?,
        };
        let series = SyntheticSeries {
            start,
            bars: self.bars,
            start_price: self.start_price,
            trade_type: config.backtest.trade_type,
        };

        for symbol in symbols {
            let path = self.out.join(format!("{symbol}.parquet"));
            let ticks = series.generate(symbol);
            write_ticks(&path, &ticks, series.trade_type)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(%symbol, bars = ticks.len(), path = %path.display(), "Wrote series");
        }

        Ok(())
    }
}
