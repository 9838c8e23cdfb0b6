//! Volatility inputs
//!
//! Historical volatility from daily closes and the HV/VIX blended proxy:
//!
//! sigma = w * VIX/100 + (1 - w) * HV
//!
//! clipped to a floor and a cap. The VIX is a 30-day annualized implied vol,
//! so it tracks where option premia actually trade better than HV alone.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{normalize_bars, normalize_vix, Bar, LabError, LabResult, SigmaRow, VixBar};

/// Parameters of the HV/VIX volatility proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaProxyParams {
    /// Rolling window for historical vol, in returns
    pub hv_window: usize,
    /// Periods per year used to annualize HV
    pub hv_annualization: f64,
    /// Weight of VIX/100 in the blend
    pub vix_weight: f64,
    pub sigma_floor: f64,
    pub sigma_cap: f64,
}

impl Default for SigmaProxyParams {
    fn default() -> Self {
        Self {
            hv_window: 20,
            hv_annualization: 252.0,
            vix_weight: 0.6,
            sigma_floor: 0.05,
            sigma_cap: 2.0,
        }
    }
}

impl SigmaProxyParams {
    fn validate(&self) -> LabResult<()> {
        if !(0.0..=1.0).contains(&self.vix_weight) {
            return Err(LabError::invalid_input(format!(
                "vix_weight must be in [0, 1], got {}",
                self.vix_weight
            )));
        }
        if !(self.sigma_floor <= self.sigma_cap) {
            return Err(LabError::invalid_input(format!(
                "sigma_floor {} above sigma_cap {}",
                self.sigma_floor, self.sigma_cap
            )));
        }
        Ok(())
    }
}

/// Daily log returns; index i holds ln(c[i] / c[i-1]), index 0 is None
pub fn log_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return out;
    }
    out.push(None);
    for pair in closes.windows(2) {
        let r = (pair[1] / pair[0]).ln();
        out.push(if pair[0] > 0.0 && r.is_finite() { Some(r) } else { None });
    }
    out
}

/// Sample standard deviation (n - 1 denominator)
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// Rolling sample std over a window; entries whose window is incomplete or
/// contains a gap are None
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window < 2 {
        return out;
    }
    for end in (window - 1)..values.len() {
        let slice = &values[end + 1 - window..=end];
        let complete: Option<Vec<f64>> = slice.iter().copied().collect();
        out[end] = complete.as_deref().and_then(sample_std);
    }
    out
}

/// Annualized historical volatility from closes: rolling std of log returns
/// times sqrt(annualization)
pub fn hist_vol(closes: &[f64], window: usize, annualization: f64) -> Vec<Option<f64>> {
    let scale = annualization.sqrt();
    rolling_std(&log_returns(closes), window)
        .into_iter()
        .map(|v| v.map(|s| s * scale))
        .collect()
}

/// Build the HV/VIX volatility proxy on the underlying's dates.
///
/// VIX closes are matched by date and forward filled over underlying dates
/// with no VIX print. Rows where either component is missing carry no proxy.
pub fn sigma_proxy_hv_vix(
    underlying: &[Bar],
    vix: &[VixBar],
    params: &SigmaProxyParams,
) -> LabResult<Vec<SigmaRow>> {
    params.validate()?;
    if underlying.is_empty() {
        return Err(LabError::data("No underlying bars for sigma proxy"));
    }
    if vix.is_empty() {
        return Err(LabError::data("No VIX bars for sigma proxy"));
    }

    let mut bars = underlying.to_vec();
    normalize_bars(&mut bars);
    let mut vix = vix.to_vec();
    normalize_vix(&mut vix);

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let hv = hist_vol(&closes, params.hv_window, params.hv_annualization);

    let vix_by_date: HashMap<_, _> = vix.iter().map(|v| (v.date, v.vix_close)).collect();

    let w = params.vix_weight;
    let mut last_vix: Option<f64> = None;
    let rows: Vec<SigmaRow> = bars
        .iter()
        .zip(hv)
        .map(|(bar, hv)| {
            if let Some(&v) = vix_by_date.get(&bar.date) {
                if v.is_finite() {
                    last_vix = Some(v);
                }
            }
            let sigma_proxy = match (hv, last_vix) {
                (Some(hv), Some(v)) => {
                    Some((w * v / 100.0 + (1.0 - w) * hv).clamp(params.sigma_floor, params.sigma_cap))
                }
                _ => None,
            };
            SigmaRow {
                date: bar.date,
                close: bar.close,
                hv,
                vix: last_vix,
                sigma_proxy,
            }
        })
        .collect();

    let priced = rows.iter().filter(|r| r.sigma_proxy.is_some()).count();
    tracing::info!(
        "Built sigma proxy: {} rows, {} with sigma (weight {:.2})",
        rows.len(),
        priced,
        w
    );
    if let Some(last) = rows.last() {
        tracing::debug!(
            "Last sigma_proxy {:?}, HV {:?}, VIX {:?}",
            last.sigma_proxy,
            last.hv,
            last.vix
        );
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    #[test]
    fn test_hist_vol_constant_growth_is_zero() {
        // Constant log return => zero dispersion
        let closes: Vec<f64> = (0..30).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let hv = hist_vol(&closes, 20, 252.0);

        assert!(hv[..20].iter().all(|v| v.is_none()));
        assert!(hv[20].unwrap().abs() < 1e-10);
    }

    #[test]
    fn test_hist_vol_alternating() {
        // +u, -u alternating returns: sample std over an even window of 2 is u * sqrt(2)
        let u = 0.01_f64;
        let mut closes = vec![100.0];
        for i in 0..10 {
            let last = *closes.last().unwrap();
            closes.push(last * if i % 2 == 0 { u.exp() } else { (-u).exp() });
        }
        let hv = hist_vol(&closes, 2, 1.0);
        assert!((hv[2].unwrap() - u * 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_sample_std() {
        assert!(sample_std(&[1.0]).is_none());
        let s = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((s - 2.138089935).abs() < 1e-6);
    }

    #[test]
    fn test_sigma_proxy_blend_and_ffill() {
        let ds = dates(30);
        let bars: Vec<Bar> = ds
            .iter()
            .enumerate()
            .map(|(i, d)| Bar::new(*d, 100.0 * 1.01_f64.powi(i as i32)))
            .collect();
        // VIX only on even days; odd days are forward filled
        let vix: Vec<VixBar> = ds
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 2 == 0)
            .map(|(i, d)| VixBar::new(*d, 20.0 + i as f64))
            .collect();

        let params = SigmaProxyParams::default();
        let rows = sigma_proxy_hv_vix(&bars, &vix, &params).unwrap();

        assert_eq!(rows.len(), 30);
        assert!(rows[19].sigma_proxy.is_none());
        assert_eq!(rows[21].vix, Some(40.0));

        // HV is zero, so sigma = 0.6 * VIX / 100
        let expected = 0.6 * 40.0 / 100.0;
        assert!((rows[21].sigma_proxy.unwrap() - expected).abs() < 1e-10);
    }

    #[test]
    fn test_sigma_proxy_waits_for_first_vix() {
        let ds = dates(30);
        let bars: Vec<Bar> = ds.iter().map(|d| Bar::new(*d, 100.0)).collect();
        // VIX history starts on day 25, after HV has warmed up
        let vix: Vec<VixBar> = ds[25..].iter().map(|d| VixBar::new(*d, 20.0)).collect();

        let rows = sigma_proxy_hv_vix(&bars, &vix, &SigmaProxyParams::default()).unwrap();

        for row in &rows[20..25] {
            assert!(row.hv.is_some());
            assert!(row.vix.is_none());
            assert!(row.sigma_proxy.is_none());
        }
        assert_eq!(rows[25].vix, Some(20.0));
        assert!((rows[25].sigma_proxy.unwrap() - 0.12).abs() < 1e-12);
        assert_eq!(rows[29].sigma_proxy, rows[25].sigma_proxy);
    }

    #[test]
    fn test_sigma_proxy_floor_cap() {
        let ds = dates(25);
        let bars: Vec<Bar> = ds.iter().map(|d| Bar::new(*d, 100.0)).collect();
        let low: Vec<VixBar> = ds.iter().map(|d| VixBar::new(*d, 1.0)).collect();
        let high: Vec<VixBar> = ds.iter().map(|d| VixBar::new(*d, 900.0)).collect();
        let params = SigmaProxyParams::default();

        let rows = sigma_proxy_hv_vix(&bars, &low, &params).unwrap();
        assert_eq!(rows[24].sigma_proxy, Some(0.05));

        let rows = sigma_proxy_hv_vix(&bars, &high, &params).unwrap();
        assert_eq!(rows[24].sigma_proxy, Some(2.0));
    }

    #[test]
    fn test_sigma_proxy_rejects_bad_input() {
        let params = SigmaProxyParams::default();
        assert!(sigma_proxy_hv_vix(&[], &[], &params).is_err());

        let bad = SigmaProxyParams {
            vix_weight: 1.5,
            ..Default::default()
        };
        let ds = dates(3);
        let bars: Vec<Bar> = ds.iter().map(|d| Bar::new(*d, 100.0)).collect();
        let vix: Vec<VixBar> = ds.iter().map(|d| VixBar::new(*d, 15.0)).collect();
        assert!(sigma_proxy_hv_vix(&bars, &vix, &bad).is_err());
    }
}
