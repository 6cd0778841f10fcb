//! Parquet state saver

use super::{SaverError, StateSaver};
use crate::account::{AccountId, EquityPoint};
use crate::execution::{Order, OrderStatus, Side};
use arrow::array::{ArrayRef, StringArray, TimestampMicrosecondArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn timestamp_field() -> Field {
    Field::new(
        "timestamp",
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )
}

/// Filled order schema
pub fn order_schema() -> Schema {
    Schema::new(vec![
        timestamp_field(),
        Field::new("order_id", DataType::Utf8, false),
        Field::new("account_id", DataType::UInt64, false),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("side", DataType::Utf8, false),
        Field::new("quantity", DataType::Utf8, false),
        Field::new("price", DataType::Utf8, false),
        Field::new("fill_price", DataType::Utf8, true),
        Field::new("fee", DataType::Utf8, false),
        Field::new("status", DataType::Utf8, false),
    ])
}

/// Equity curve schema
pub fn equity_schema() -> Schema {
    Schema::new(vec![
        timestamp_field(),
        Field::new("account_id", DataType::UInt64, false),
        Field::new("equity", DataType::Utf8, false),
    ])
}

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

fn status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Filled => "filled",
        OrderStatus::Rejected => "rejected",
    }
}

/// Buffers run state and writes `{run}_orders.parquet` and
/// `{run}_equity.parquet` on commit
pub struct ParquetStateSaver {
    output_dir: PathBuf,
    run_name: String,
    orders: Vec<Order>,
    equity: Vec<(AccountId, EquityPoint)>,
}

impl ParquetStateSaver {
    pub fn new(output_dir: impl Into<PathBuf>, run_name: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            run_name: run_name.into(),
            orders: vec![],
            equity: vec![],
        }
    }

    pub fn orders_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_orders.parquet", self.run_name))
    }

    pub fn equity_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_equity.parquet", self.run_name))
    }

    fn write_batch(path: &Path, batch: RecordBatch) -> Result<(), SaverError> {
        let file = File::create(path).map_err(|source| SaverError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    fn orders_batch(&self) -> Result<RecordBatch, SaverError> {
        let orders = &self.orders;
        let timestamps: Vec<i64> = orders
            .iter()
            .map(|o| o.timestamp.timestamp_micros())
            .collect();
        let ids: Vec<String> = orders.iter().map(|o| o.id.to_string()).collect();
        let quantities: Vec<String> = orders.iter().map(|o| o.quantity.to_string()).collect();
        let prices: Vec<String> = orders.iter().map(|o| o.price.to_string()).collect();
        let fill_prices: Vec<Option<String>> = orders
            .iter()
            .map(|o| o.fill_price.map(|p| p.to_string()))
            .collect();
        let fees: Vec<String> = orders.iter().map(|o| o.fee.to_string()).collect();

        let columns: Vec<ArrayRef> = vec![
            Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
            Arc::new(StringArray::from(
                ids.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                orders.iter().map(|o| o.account_id.0).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                orders.iter().map(|o| o.symbol.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                orders.iter().map(|o| side_str(o.side)).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                quantities.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                prices.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(fill_prices)),
            Arc::new(StringArray::from(
                fees.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                orders.iter().map(|o| status_str(o.status)).collect::<Vec<_>>(),
            )),
        ];

        Ok(RecordBatch::try_new(Arc::new(order_schema()), columns)?)
    }

    fn equity_batch(&self) -> Result<RecordBatch, SaverError> {
        let timestamps: Vec<i64> = self
            .equity
            .iter()
            .map(|(_, p)| p.timestamp.timestamp_micros())
            .collect();
        let values: Vec<String> = self
            .equity
            .iter()
            .map(|(_, p)| p.equity.to_string())
            .collect();

        let columns: Vec<ArrayRef> = vec![
            Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
            Arc::new(UInt64Array::from(
                self.equity.iter().map(|(id, _)| id.0).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                values.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )),
        ];

        Ok(RecordBatch::try_new(Arc::new(equity_schema()), columns)?)
    }
}

impl StateSaver for ParquetStateSaver {
    fn record_order(&mut self, order: &Order) {
        self.orders.push(order.clone());
    }

    fn record_equity(&mut self, account: AccountId, point: EquityPoint) {
        match self.equity.last_mut() {
            Some((id, last)) if *id == account && last.timestamp == point.timestamp => {
                *last = point
            }
            _ => self.equity.push((account, point)),
        }
    }

    fn commit(&mut self) -> Result<(), SaverError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| SaverError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        if !self.orders.is_empty() {
            Self::write_batch(&self.orders_path(), self.orders_batch()?)?;
        }
        if !self.equity.is_empty() {
            Self::write_batch(&self.equity_path(), self.equity_batch()?)?;
        }

        tracing::info!(
            run = %self.run_name,
            orders = self.orders.len(),
            equity_points = self.equity.len(),
            dir = %self.output_dir.display(),
            "Saved run state"
        );

        self.orders.clear();
        self.equity.clear();
        Ok(())
    }
}
