//! Daily market series
//!
//! Close-only bars for the underlying and the VIX, plus the volatility proxy
//! row that feeds the backtest.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily close of the underlying
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(alias = "datetime")]
    pub date: NaiveDate,
    pub close: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Daily VIX close, in index points (18.5 means 18.5% annualized)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VixBar {
    #[serde(alias = "datetime")]
    pub date: NaiveDate,
    pub vix_close: f64,
}

impl VixBar {
    pub fn new(date: NaiveDate, vix_close: f64) -> Self {
        Self { date, vix_close }
    }
}

impl From<Bar> for VixBar {
    fn from(bar: Bar) -> Self {
        Self::new(bar.date, bar.close)
    }
}

/// Underlying close with the volatility inputs of that day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmaRow {
    pub date: NaiveDate,
    pub close: f64,
    /// Annualized historical vol (None during warm-up)
    pub hv: Option<f64>,
    /// VIX level in points, forward filled onto the underlying's dates
    pub vix: Option<f64>,
    /// Blended and clipped volatility used for pricing
    pub sigma_proxy: Option<f64>,
}

impl SigmaRow {
    pub fn bar(&self) -> Bar {
        Bar::new(self.date, self.close)
    }
}

/// Sort by date and drop duplicated dates, keeping the last observation
pub fn normalize_bars(bars: &mut Vec<Bar>) {
    bars.sort_by_key(|b| b.date);
    dedup_keep_last(bars, |b| b.date);
}

/// Sort by date and drop duplicated dates, keeping the last observation
pub fn normalize_vix(bars: &mut Vec<VixBar>) {
    bars.sort_by_key(|b| b.date);
    dedup_keep_last(bars, |b| b.date);
}

fn dedup_keep_last<T, F>(items: &mut Vec<T>, key: F)
where
    F: Fn(&T) -> NaiveDate,
{
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        match out.last_mut() {
            Some(last) if key(last) == key(&item) => *last = item,
            _ => out.push(item),
        }
    }
    *items = out;
}
