//! Performance metrics on an equity curve
//!
//! All ratios use sample standard deviations (n - 1) and return `None`
//! when undefined (too few points, zero dispersion, no drawdown).

use crate::models::sample_std;

/// Simple returns: equity[i] / equity[i-1] - 1, non-finite values dropped
pub fn equity_to_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| w[1] / w[0] - 1.0)
        .filter(|r| r.is_finite())
        .collect()
}

/// equity / running peak - 1 at each point
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&e| {
            peak = peak.max(e);
            e / peak - 1.0
        })
        .collect()
}

/// Worst drawdown (a non-positive fraction)
pub fn max_drawdown(equity: &[f64]) -> Option<f64> {
    drawdown_series(equity)
        .into_iter()
        .filter(|d| d.is_finite())
        .reduce(f64::min)
}

/// Compound annual growth rate, assuming `periods_per_year` points per year
pub fn annualized_return(equity: &[f64], periods_per_year: f64) -> Option<f64> {
    if equity.len() < 2 {
        return None;
    }
    let first = equity[0];
    let last = equity[equity.len() - 1];
    if !(first > 0.0) {
        return None;
    }
    let n_periods = (equity.len() - 1) as f64;
    let cagr = (last / first).powf(periods_per_year / n_periods) - 1.0;
    cagr.is_finite().then_some(cagr)
}

/// Annualized volatility of periodic returns
pub fn annualized_vol(returns: &[f64], periods_per_year: f64) -> Option<f64> {
    sample_std(returns).map(|s| s * periods_per_year.sqrt())
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn excess_returns(returns: &[f64], rf_annual: f64, periods_per_year: f64) -> Vec<f64> {
    let rf_period = rf_annual / periods_per_year;
    returns.iter().map(|r| r - rf_period).collect()
}

/// Annualized Sharpe ratio
pub fn sharpe_ratio(returns: &[f64], rf_annual: f64, periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let excess = excess_returns(returns, rf_annual, periods_per_year);
    let vol = sample_std(&excess)?;
    if !(vol > 0.0) {
        return None;
    }
    Some(mean(&excess)? / vol * periods_per_year.sqrt())
}

/// Annualized Sortino ratio: mean excess over the std of negative excess returns
pub fn sortino_ratio(returns: &[f64], rf_annual: f64, periods_per_year: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let excess = excess_returns(returns, rf_annual, periods_per_year);
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    let dd = sample_std(&downside)?;
    if !(dd > 0.0) {
        return None;
    }
    Some(mean(&excess)? / dd * periods_per_year.sqrt())
}

/// Fraction of strictly positive returns
pub fn hit_ratio(returns: &[f64]) -> Option<f64> {
    if returns.is_empty() {
        return None;
    }
    let wins = returns.iter().filter(|r| **r > 0.0).count();
    Some(wins as f64 / returns.len() as f64)
}

/// CAGR over the absolute max drawdown
pub fn calmar_ratio(equity: &[f64], periods_per_year: f64) -> Option<f64> {
    let cagr = annualized_return(equity, periods_per_year)?;
    let mdd = max_drawdown(equity)?.abs();
    if !(mdd > 0.0) {
        return None;
    }
    Some(cagr / mdd)
}

/// Rolling annualized vol; entries before the first full window are None
pub fn rolling_vol(returns: &[f64], window: usize, periods_per_year: f64) -> Vec<Option<f64>> {
    let mut out = vec![None; returns.len()];
    if window < 2 {
        return out;
    }
    let scale = periods_per_year.sqrt();
    for end in (window - 1)..returns.len() {
        out[end] = sample_std(&returns[end + 1 - window..=end]).map(|s| s * scale);
    }
    out
}

/// Equal-width histogram bin
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width histogram over [min, max]; the last bin is closed on the right
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // Degenerate range: one unit-wide bin around the value
    let (lo, hi) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + i as f64 * width,
            upper: lo + (i + 1) as f64 * width,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_and_drawdown() {
        let eq = [100.0, 110.0, 99.0, 121.0];
        let r = equity_to_returns(&eq);
        assert_eq!(r.len(), 3);
        assert!((r[0] - 0.10).abs() < 1e-12);
        assert!((r[1] + 0.10).abs() < 1e-12);

        let dd = drawdown_series(&eq);
        assert_eq!(dd[0], 0.0);
        assert!((dd[2] + 0.10).abs() < 1e-12);
        assert_eq!(dd[3], 0.0);
        assert!((max_drawdown(&eq).unwrap() + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_cagr() {
        // Doubling over 252 periods = 100% a year
        let eq: Vec<f64> = (0..=252).map(|i| 100.0 * 2f64.powf(i as f64 / 252.0)).collect();
        let cagr = annualized_return(&eq, 252.0).unwrap();
        assert!((cagr - 1.0).abs() < 1e-9);

        assert!(annualized_return(&[100.0], 252.0).is_none());
        assert!(annualized_return(&[0.0, 10.0], 252.0).is_none());
    }

    #[test]
    fn test_sharpe_and_sortino() {
        let r = [0.01, -0.005, 0.02, -0.01, 0.015];
        let sharpe = sharpe_ratio(&r, 0.0, 252.0).unwrap();
        let sortino = sortino_ratio(&r, 0.0, 252.0).unwrap();

        let m = 0.03 / 5.0;
        let expected = m / sample_std(&r).unwrap() * 252f64.sqrt();
        assert!((sharpe - expected).abs() < 1e-12);
        // Downside std of [-0.005, -0.01]
        let dd = sample_std(&[-0.005, -0.01]).unwrap();
        assert!((sortino - m / dd * 252f64.sqrt()).abs() < 1e-12);

        // Constant returns have no dispersion
        assert!(sharpe_ratio(&[0.01, 0.01, 0.01], 0.0, 252.0).is_none());
        // A single losing day leaves downside std undefined
        assert!(sortino_ratio(&[0.01, -0.01, 0.02], 0.0, 252.0).is_none());
    }

    #[test]
    fn test_hit_ratio_and_calmar() {
        assert_eq!(hit_ratio(&[0.1, -0.1, 0.0, 0.2]), Some(0.5));
        assert!(hit_ratio(&[]).is_none());

        // Never draws down: calmar undefined
        assert!(calmar_ratio(&[100.0, 101.0, 102.0], 252.0).is_none());
        assert!(calmar_ratio(&[100.0, 90.0, 120.0], 252.0).unwrap() > 0.0);
    }

    #[test]
    fn test_rolling_vol() {
        let r = [0.01, -0.01, 0.01, -0.01];
        let v = rolling_vol(&r, 2, 1.0);
        assert!(v[0].is_none());
        assert!((v[1].unwrap() - 2e-4f64.sqrt()).abs() < 1e-12);
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn test_histogram() {
        let h = histogram(&[0.0, 0.1, 0.2, 0.3, 1.0], 2);
        assert_eq!(h.len(), 2);
        assert_eq!(h[0].count, 4);
        assert_eq!(h[1].count, 1);
        assert_eq!(h.iter().map(|b| b.count).sum::<usize>(), 5);

        let flat = histogram(&[3.0, 3.0], 4);
        assert_eq!(flat.iter().map(|b| b.count).sum::<usize>(), 2);
        assert!(histogram(&[], 10).is_empty());
    }
}
