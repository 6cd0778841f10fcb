//! Prometheus metrics

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Ticks handed to strategies
    TicksDispatched,
    /// Orders filled by the executor
    OrdersFilled,
    /// Orders rejected by the executor
    OrdersRejected,
    /// Runs that ended with an error
    RunsFailed,
    /// Runs that completed and were reported
    RunsCompleted,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Equity of the account last snapshotted
    Equity,
    /// Ticks waiting in the dispatcher channel
    QueuedTicks,
}

impl CounterMetric {
    pub fn name(self) -> &'static str {
        match self {
            CounterMetric::TicksDispatched => "backtest_ticks_dispatched_total",
            CounterMetric::OrdersFilled => "backtest_orders_filled_total",
            CounterMetric::OrdersRejected => "backtest_orders_rejected_total",
            CounterMetric::RunsFailed => "backtest_runs_failed_total",
            CounterMetric::RunsCompleted => "backtest_runs_completed_total",
        }
    }
}

impl GaugeMetric {
    pub fn name(self) -> &'static str {
        match self {
            GaugeMetric::Equity => "backtest_account_equity",
            GaugeMetric::QueuedTicks => "backtest_queued_ticks",
        }
    }
}

/// Increment a counter by `value`
pub fn increment(metric: CounterMetric, value: u64) {
    ::metrics::counter!(metric.name()).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    ::metrics::gauge!(metric.name()).set(value);
}

/// Install the Prometheus recorder with an HTTP scrape endpoint on `port`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to start metrics exporter on {addr}"))?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
