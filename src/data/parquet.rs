//! Parquet tick storage
//!
//! One file per symbol. Decimal columns are stored as strings to keep full
//! precision.

use super::{DataError, TickSource};
use crate::feed::{Tick, TradeType};
use arrow::array::{Array, ArrayRef, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

fn timestamp_field() -> Field {
    Field::new(
        "timestamp",
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )
}

/// OHLCV bar schema
pub fn quote_schema() -> Schema {
    Schema::new(vec![
        timestamp_field(),
        Field::new("open", DataType::Utf8, false),
        Field::new("high", DataType::Utf8, false),
        Field::new("low", DataType::Utf8, false),
        Field::new("close", DataType::Utf8, false),
        Field::new("volume", DataType::Utf8, false),
    ])
}

/// Single-price trade schema
pub fn trade_schema() -> Schema {
    Schema::new(vec![
        timestamp_field(),
        Field::new("price", DataType::Utf8, false),
        Field::new("volume", DataType::Utf8, false),
    ])
}

fn decimal_column(values: impl Iterator<Item = Decimal>) -> ArrayRef {
    let strings: Vec<String> = values.map(|d| d.to_string()).collect();
    Arc::new(StringArray::from(
        strings.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
    ))
}

/// Write ticks of one symbol to a Parquet file
pub fn write_ticks(path: &Path, ticks: &[Tick], trade_type: TradeType) -> Result<(), DataError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| DataError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let schema = Arc::new(match trade_type {
        TradeType::Quote => quote_schema(),
        TradeType::Tick => trade_schema(),
    });
    let file = File::create(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let timestamps: Vec<i64> = ticks
        .iter()
        .map(|t| t.timestamp.timestamp_micros())
        .collect();
    let mut columns: Vec<ArrayRef> =
        vec![Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC"))];

    match trade_type {
        TradeType::Quote => {
            columns.push(decimal_column(ticks.iter().map(|t| t.open)));
            columns.push(decimal_column(ticks.iter().map(|t| t.high)));
            columns.push(decimal_column(ticks.iter().map(|t| t.low)));
            columns.push(decimal_column(ticks.iter().map(|t| t.close)));
        }
        TradeType::Tick => {
            columns.push(decimal_column(ticks.iter().map(|t| t.close)));
        }
    }
    columns.push(decimal_column(ticks.iter().map(|t| t.volume)));

    let batch = RecordBatch::try_new(schema, columns)?;

    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = ?path, count = ticks.len(), "Wrote ticks to Parquet");

    Ok(())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, DataError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| DataError::Schema(format!("missing or invalid {name} column")))
}

fn decimal_at(column: &StringArray, i: usize) -> Result<Decimal, DataError> {
    let value = column.value(i);
    Decimal::from_str(value).map_err(|source| DataError::Decimal {
        value: value.to_string(),
        source,
    })
}

/// Read all ticks of `symbol` from a Parquet file
pub fn read_ticks(path: &Path, symbol: &str, trade_type: TradeType) -> Result<Vec<Tick>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut ticks = Vec::new();

    for batch_result in reader {
        let batch = batch_result?;

        let timestamps = batch
            .column_by_name("timestamp")
            .and_then(|c| c.as_any().downcast_ref::<TimestampMicrosecondArray>())
            .ok_or_else(|| DataError::Schema("missing or invalid timestamp column".into()))?;
        let volumes = string_column(&batch, "volume")?;

        match trade_type {
            TradeType::Quote => {
                let opens = string_column(&batch, "open")?;
                let highs = string_column(&batch, "high")?;
                let lows = string_column(&batch, "low")?;
                let closes = string_column(&batch, "close")?;

                for i in 0..batch.num_rows() {
                    ticks.push(Tick::quote(
                        symbol,
                        timestamp_at(timestamps, i)?,
                        decimal_at(opens, i)?,
                        decimal_at(highs, i)?,
                        decimal_at(lows, i)?,
                        decimal_at(closes, i)?,
                        decimal_at(volumes, i)?,
                    ));
                }
            }
            TradeType::Tick => {
                let prices = string_column(&batch, "price")?;

                for i in 0..batch.num_rows() {
                    ticks.push(Tick::trade(
                        symbol,
                        timestamp_at(timestamps, i)?,
                        decimal_at(prices, i)?,
                        decimal_at(volumes, i)?,
                    ));
                }
            }
        }
    }

    Ok(ticks)
}

fn timestamp_at(
    column: &TimestampMicrosecondArray,
    i: usize,
) -> Result<DateTime<chrono::Utc>, DataError> {
    if column.is_null(i) {
        return Err(DataError::Schema(format!("null timestamp at row {i}")));
    }
    DateTime::from_timestamp_micros(column.value(i))
        .ok_or_else(|| DataError::Schema(format!("timestamp out of range at row {i}")))
}

/// Reads `{dir}/{SYMBOL}.parquet` files
pub struct ParquetSource {
    dir: PathBuf,
    trade_type: TradeType,
}

impl ParquetSource {
    pub fn new(dir: impl Into<PathBuf>, trade_type: TradeType) -> Self {
        Self {
            dir: dir.into(),
            trade_type,
        }
    }

    /// File holding the history of `symbol`
    pub fn file_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.parquet"))
    }
}

#[async_trait]
impl TickSource for ParquetSource {
    async fn open(&self, symbol: &str) -> Result<Vec<Tick>, DataError> {
        let path = self.file_path(symbol);
        if !path.exists() {
            return Err(DataError::UnknownSymbol(symbol.to_string()));
        }

        let symbol = symbol.to_string();
        let trade_type = self.trade_type;
        tokio::task::spawn_blocking(move || read_ticks(&path, &symbol, trade_type))
            .await
            .map_err(|e| DataError::Task(e.to_string()))?
    }
}
