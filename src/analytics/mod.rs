//! Backtest analytics
//!
//! Summary metrics for one or two equity curves and the plot-ready series
//! (equity, drawdown, rolling vol, return histograms) written as CSV.

pub mod metrics;

pub use metrics::*;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::{LabError, LabResult};
use crate::strategy::DailyRow;

/// Bins used for return histograms
pub const HISTOGRAM_BINS: usize = 60;

/// Analytics settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub periods_per_year: f64,
    pub rf_annual: f64,
    /// Rolling vol window in returns (~3 months)
    pub rolling_vol_window: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            rf_annual: 0.0,
            rolling_vol_window: 63,
        }
    }
}

/// Dated equity value, the only part of a daily row analytics needs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    #[serde(alias = "datetime")]
    pub date: NaiveDate,
    pub equity: f64,
}

impl From<&DailyRow> for EquityPoint {
    fn from(row: &DailyRow) -> Self {
        Self {
            date: row.date,
            equity: row.equity,
        }
    }
}

/// Convert backtest output to an equity series
pub fn equity_points(daily: &[DailyRow]) -> Vec<EquityPoint> {
    daily.iter().map(EquityPoint::from).collect()
}

/// Summary metrics of one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub strategy: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub start_equity: f64,
    pub end_equity: f64,
    pub total_return: f64,
    pub cagr: Option<f64>,
    pub ann_vol: Option<f64>,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub calmar: Option<f64>,
    pub hit_ratio: Option<f64>,
    pub avg_daily_ret: Option<f64>,
    pub std_daily_ret: Option<f64>,
}

/// Compute summary metrics over an equity series sorted by date
pub fn compute_metrics(label: &str, series: &[EquityPoint], cfg: &AnalyticsConfig) -> LabResult<Metrics> {
    let (first, last) = match (series.first(), series.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(LabError::data(format!("No equity rows for '{}'", label))),
    };

    let equity: Vec<f64> = series.iter().map(|p| p.equity).collect();
    let rets = equity_to_returns(&equity);
    let ppy = cfg.periods_per_year;

    let avg_daily_ret = if rets.is_empty() {
        None
    } else {
        Some(rets.iter().sum::<f64>() / rets.len() as f64)
    };

    Ok(Metrics {
        strategy: label.to_string(),
        start: first.date,
        end: last.date,
        start_equity: first.equity,
        end_equity: last.equity,
        total_return: last.equity / first.equity - 1.0,
        cagr: annualized_return(&equity, ppy),
        ann_vol: annualized_vol(&rets, ppy),
        sharpe: sharpe_ratio(&rets, cfg.rf_annual, ppy),
        sortino: sortino_ratio(&rets, cfg.rf_annual, ppy),
        max_drawdown: max_drawdown(&equity),
        calmar: calmar_ratio(&equity, ppy),
        hit_ratio: hit_ratio(&rets),
        avg_daily_ret,
        std_daily_ret: crate::models::sample_std(&rets),
    })
}

/// Read a daily CSV back; only `date` (or `datetime`) and `equity` are used.
/// Rows are returned sorted by date.
pub fn load_daily_csv(path: &Path) -> LabResult<Vec<EquityPoint>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| LabError::data(format!("Cannot open {}: {}", path.display(), e)))?;

    let mut points = Vec::new();
    for record in reader.deserialize() {
        let point: EquityPoint =
            record.map_err(|e| LabError::data(format!("Bad row in {}: {}", path.display(), e)))?;
        points.push(point);
    }
    points.sort_by_key(|p| p.date);

    tracing::debug!("Loaded {} equity rows from {}", points.len(), path.display());
    Ok(points)
}

/// Labels of the two compared runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLabels {
    pub base: String,
    pub hedged: String,
}

impl Default for RunLabels {
    fn default() -> Self {
        Self {
            base: "No Hedge".to_string(),
            hedged: "Delta-Hedged".to_string(),
        }
    }
}

/// Files written by [`run_analytics`]
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsOutput {
    pub summary: Vec<Metrics>,
    pub files: Vec<PathBuf>,
}

/// File-name fragment for a label: "Delta-Hedged" -> "deltahedged"
fn slug(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn csv_err(path: &Path, e: impl std::fmt::Display) -> LabError {
    LabError::serialization(format!("{}: {}", path.display(), e))
}

/// Write `date,<label_a>,<label_b>` on the union of both date sets
fn write_compare(
    path: &Path,
    labels: &RunLabels,
    a: &[(NaiveDate, Option<f64>)],
    b: &[(NaiveDate, Option<f64>)],
) -> LabResult<()> {
    let mut joined: BTreeMap<NaiveDate, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for &(d, v) in a {
        joined.entry(d).or_default().0 = v;
    }
    for &(d, v) in b {
        joined.entry(d).or_default().1 = v;
    }

    let mut w = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    w.write_record(["date", labels.base.as_str(), labels.hedged.as_str()])
        .map_err(|e| csv_err(path, e))?;
    for (d, (va, vb)) in joined {
        w.write_record([d.to_string(), fmt_opt(va), fmt_opt(vb)])
            .map_err(|e| csv_err(path, e))?;
    }
    w.flush()?;
    Ok(())
}

fn write_serialized<T: Serialize>(path: &Path, rows: &[T]) -> LabResult<()> {
    let mut w = csv::Writer::from_path(path).map_err(|e| csv_err(path, e))?;
    for row in rows {
        w.serialize(row).map_err(|e| csv_err(path, e))?;
    }
    w.flush()?;
    Ok(())
}

/// Dated returns: the return on day i is stamped with day i
fn dated_returns(series: &[EquityPoint]) -> Vec<(NaiveDate, f64)> {
    series
        .windows(2)
        .map(|w| (w[1].date, w[1].equity / w[0].equity - 1.0))
        .filter(|(_, r)| r.is_finite())
        .collect()
}

#[derive(Serialize)]
struct ReturnRow {
    date: NaiveDate,
    ret: f64,
}

/// Compare two runs: writes `summary_metrics.csv`, `equity_compare.csv`,
/// `drawdown_compare.csv`, `rolling_vol_compare.csv` and, per run,
/// `returns_<label>.csv` plus `hist_returns_<label>.csv`.
pub fn run_analytics(
    base: &[EquityPoint],
    hedged: &[EquityPoint],
    cfg: &AnalyticsConfig,
    out_dir: &Path,
    labels: &RunLabels,
) -> LabResult<AnalyticsOutput> {
    fs::create_dir_all(out_dir)?;

    let m_base = compute_metrics(&labels.base, base, cfg)?;
    let m_hedged = compute_metrics(&labels.hedged, hedged, cfg)?;
    let summary = vec![m_base, m_hedged];
    let mut files = Vec::new();

    let path = out_dir.join("summary_metrics.csv");
    write_serialized(&path, &summary)?;
    files.push(path);

    let equity_of = |s: &[EquityPoint]| -> Vec<(NaiveDate, Option<f64>)> {
        s.iter().map(|p| (p.date, Some(p.equity))).collect()
    };
    let path = out_dir.join("equity_compare.csv");
    write_compare(&path, labels, &equity_of(base), &equity_of(hedged))?;
    files.push(path);

    let drawdown_of = |s: &[EquityPoint]| -> Vec<(NaiveDate, Option<f64>)> {
        let eq: Vec<f64> = s.iter().map(|p| p.equity).collect();
        s.iter().zip(drawdown_series(&eq)).map(|(p, d)| (p.date, Some(d))).collect()
    };
    let path = out_dir.join("drawdown_compare.csv");
    write_compare(&path, labels, &drawdown_of(base), &drawdown_of(hedged))?;
    files.push(path);

    let rolling_of = |s: &[EquityPoint]| -> Vec<(NaiveDate, Option<f64>)> {
        let rets = dated_returns(s);
        let values: Vec<f64> = rets.iter().map(|(_, r)| *r).collect();
        rets.iter()
            .zip(rolling_vol(&values, cfg.rolling_vol_window, cfg.periods_per_year))
            .map(|((d, _), v)| (*d, v))
            .collect()
    };
    let path = out_dir.join("rolling_vol_compare.csv");
    write_compare(&path, labels, &rolling_of(base), &rolling_of(hedged))?;
    files.push(path);

    for (label, series) in [(&labels.base, base), (&labels.hedged, hedged)] {
        let rets = dated_returns(series);

        let rows: Vec<ReturnRow> = rets.iter().map(|&(date, ret)| ReturnRow { date, ret }).collect();
        let path = out_dir.join(format!("returns_{}.csv", slug(label)));
        write_serialized(&path, &rows)?;
        files.push(path);

        let values: Vec<f64> = rets.iter().map(|(_, r)| *r).collect();
        let path = out_dir.join(format!("hist_returns_{}.csv", slug(label)));
        write_serialized(&path, &histogram(&values, HISTOGRAM_BINS))?;
        files.push(path);
    }

    for m in &summary {
        tracing::info!(
            "{}: total {:.2}%, sharpe {}, max dd {}",
            m.strategy,
            m.total_return * 100.0,
            fmt_opt(m.sharpe.map(|s| (s * 100.0).round() / 100.0)),
            fmt_opt(m.max_drawdown.map(|d| (d * 10000.0).round() / 10000.0))
        );
    }

    Ok(AnalyticsOutput { summary, files })
}
