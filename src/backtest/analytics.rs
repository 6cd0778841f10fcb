//! Backtest analytics and reporting

use crate::account::EquityPoint;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Trading periods per year used to annualise the Sharpe ratio
const PERIODS_PER_YEAR: f64 = 252.0;

/// Statistics of one completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    /// Symbols the run traded
    pub symbols: Vec<String>,
    /// Equity at the first point
    pub start_value: Decimal,
    /// Equity at the last point
    pub end_value: Decimal,
    pub min_value: Decimal,
    pub max_value: Decimal,
    /// End over start, minus one
    pub total_return: Decimal,
    /// Largest peak-to-trough loss as a fraction of the peak
    pub max_drawdown: Decimal,
    /// Annualised mean over standard deviation of point returns
    pub sharpe_ratio: Decimal,
    /// Number of equity points
    pub points: usize,
}

impl RunMetrics {
    /// Compute metrics from an equity curve. `None` when the curve is empty.
    pub fn from_equity(symbols: &[String], equity: &[EquityPoint]) -> Option<Self> {
        let first = equity.first()?.equity;
        let last = equity.last()?.equity;

        let mut min_value = first;
        let mut max_value = first;
        let mut peak = first;
        let mut max_drawdown = Decimal::ZERO;
        for point in equity {
            min_value = min_value.min(point.equity);
            max_value = max_value.max(point.equity);
            peak = peak.max(point.equity);
            if peak > Decimal::ZERO {
                max_drawdown = max_drawdown.max((peak - point.equity) / peak);
            }
        }

        let total_return = if first.is_zero() {
            Decimal::ZERO
        } else {
            last / first - Decimal::ONE
        };

        Some(Self {
            symbols: symbols.to_vec(),
            start_value: first,
            end_value: last,
            min_value,
            max_value,
            total_return,
            max_drawdown,
            sharpe_ratio: sharpe_ratio(equity),
            points: equity.len(),
        })
    }
}

fn sharpe_ratio(equity: &[EquityPoint]) -> Decimal {
    let values: Vec<f64> = equity
        .iter()
        .map(|p| p.equity.try_into().unwrap_or(0.0))
        .collect();

    let returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();

    if returns.len() < 2 {
        return Decimal::ZERO;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();
    if std_dev == 0.0 || !std_dev.is_finite() {
        return Decimal::ZERO;
    }

    let sharpe = mean / std_dev * PERIODS_PER_YEAR.sqrt();
    Decimal::try_from(sharpe).unwrap_or_default().round_dp(4)
}

/// Aggregates across every run of a batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub run_count: usize,
    pub mean_end_value: Decimal,
    pub mean_return: Decimal,
    pub mean_sharpe: Decimal,
    pub worst_drawdown: Decimal,
}

/// Per-run metrics and their summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub runs: Vec<RunMetrics>,
    pub summary: BatchSummary,
}

/// Accumulates run metrics across a batch
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    runs: Vec<RunMetrics>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute and keep the metrics of one run.
    ///
    /// Runs without equity points contribute nothing.
    pub fn record(&mut self, symbols: &[String], equity: &[EquityPoint]) -> Option<&RunMetrics> {
        let Some(metrics) = RunMetrics::from_equity(symbols, equity) else {
            tracing::warn!(symbols = %symbols.join(" "), "Run produced no equity points");
            return None;
        };
        self.runs.push(metrics);
        self.runs.last()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Combined report of every recorded run
    pub fn report(&self) -> BatchReport {
        if self.runs.is_empty() {
            return BatchReport::default();
        }

        let count = Decimal::from(self.runs.len());
        let mean = |f: fn(&RunMetrics) -> Decimal| {
            self.runs.iter().map(f).sum::<Decimal>() / count
        };

        BatchReport {
            runs: self.runs.clone(),
            summary: BatchSummary {
                run_count: self.runs.len(),
                mean_end_value: mean(|r| r.end_value),
                mean_return: mean(|r| r.total_return),
                mean_sharpe: mean(|r| r.sharpe_ratio),
                worst_drawdown: self
                    .runs
                    .iter()
                    .map(|r| r.max_drawdown)
                    .max()
                    .unwrap_or_default(),
            },
        }
    }
}

impl BatchReport {
    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let mut runs = String::new();
        for run in &self.runs {
            runs.push_str(&format!(
                "{:<24} {:>14.2} {:>+9.2}% {:>8.2}% {:>8.2}\n",
                run.symbols.join(" "),
                run.end_value,
                run.total_return * dec!(100),
                run.max_drawdown * dec!(100),
                run.sharpe_ratio,
            ));
        }

        format!(
            r#"
══════════════════════════════════════════════════════
               BACKTEST RESULTS
══════════════════════════════════════════════════════

RUNS
───────────────────────────────────────────────────────
{:<24} {:>14} {:>10} {:>9} {:>8}
{}
SUMMARY
───────────────────────────────────────────────────────
Runs:             {}
Mean End Value:   {:.2}
Mean Return:      {:+.2}%
Mean Sharpe:      {:.2}
Worst Drawdown:   {:.2}%
══════════════════════════════════════════════════════
"#,
            "SYMBOLS",
            "END VALUE",
            "RETURN",
            "MAX DD",
            "SHARPE",
            runs,
            self.summary.run_count,
            self.summary.mean_end_value,
            self.summary.mean_return * dec!(100),
            self.summary.mean_sharpe,
            self.summary.worst_drawdown * dec!(100),
        )
    }
}
