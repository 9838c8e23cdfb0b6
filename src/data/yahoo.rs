//! Yahoo Finance daily history
//!
//! Pulls daily closes from the public chart endpoint. Used for the
//! underlying (SPY, ^GSPC for SPX) and for the ^VIX index.
//!
//! Note: Yahoo's API is unofficial and intended for personal use.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::core::{normalize_bars, Bar, LabError, LabResult, VixBar};

/// Symbol of the CBOE volatility index on Yahoo
pub const VIX_SYMBOL: &str = "^VIX";

/// Yahoo Finance chart API client
pub struct YahooClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooClient {
    pub fn new() -> LabResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| LabError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: "https://query1.finance.yahoo.com/v8/finance/chart".to_string(),
        })
    }

    fn chart(&self, symbol: &str, range: &str) -> LabResult<ChartData> {
        let url = format!("{}/{}?range={}&interval=1d", self.base_url, symbol, range);
        tracing::debug!("GET {}", url);

        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| LabError::Network(e.to_string()))?
            .text()
            .map_err(|e| LabError::Network(e.to_string()))?;

        parse_chart(&body)
    }

    /// Daily closes for a symbol over a Yahoo range ("1y", "5y", "max", ...)
    pub fn daily_bars(&self, symbol: &str, range: &str) -> LabResult<Vec<Bar>> {
        let bars = self.chart(symbol, range)?.bars;
        if bars.is_empty() {
            return Err(LabError::data(format!("No daily bars returned for {}", symbol)));
        }
        tracing::info!(
            "Fetched {} daily bars for {} ({} to {})",
            bars.len(),
            symbol,
            bars[0].date,
            bars[bars.len() - 1].date
        );
        Ok(bars)
    }

    /// Daily VIX closes over a Yahoo range
    pub fn vix_history(&self, range: &str) -> LabResult<Vec<VixBar>> {
        Ok(self
            .daily_bars(VIX_SYMBOL, range)?
            .into_iter()
            .map(VixBar::from)
            .collect())
    }
}

/// Parsed chart response
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    /// Sorted daily closes; null closes are skipped
    pub bars: Vec<Bar>,
}

/// Parse a chart API response body
pub fn parse_chart(body: &str) -> LabResult<ChartData> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| LabError::data(format!("Failed to parse chart: {}", e)))?;

    if let Some(err) = response.chart.error {
        return Err(LabError::data(format!("Chart API error: {}", err)));
    }

    let result = response
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| LabError::data("No chart data returned"))?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let mut bars: Vec<Bar> = result
        .timestamp
        .unwrap_or_default()
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let close = close?;
            let date = session_date(ts, result.meta.gmtoffset)?;
            close.is_finite().then(|| Bar::new(date, close))
        })
        .collect();
    normalize_bars(&mut bars);

    Ok(ChartData { bars })
}

/// Exchange-local date of a bar timestamp
fn session_date(ts: i64, gmt_offset: Option<i64>) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts + gmt_offset.unwrap_or(0), 0).map(|dt| dt.date_naive())
}

// Yahoo Finance API response structures

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    close: Vec<Option<f64>>,
}
