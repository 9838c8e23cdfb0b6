//! Black-Scholes Model
//!
//! Provides:
//! - European option price and Greeks with a continuous dividend yield
//! - Long straddle aggregation (call + put)
//! - Implied volatility solver (Newton-Raphson with bisection fallback)
//!
//! Both SPY and SPX legs are priced as European options. Early exercise of
//! SPY calls around ex-dividend dates is not modelled.

use std::f64::consts::{PI, SQRT_2};

use statrs::function::erf::erf;

use crate::core::{Greeks, LabError, LabResult, OptionType, StraddleGreeks};

/// Standard normal CDF
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Standard normal PDF
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Inputs of a single Black-Scholes evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsInputs {
    /// Underlying price
    pub spot: f64,
    pub strike: f64,
    /// Time to expiry in years
    pub time: f64,
    /// Continuously compounded risk-free rate
    pub rate: f64,
    /// Continuous dividend yield
    pub div: f64,
    /// Annualized volatility
    pub vol: f64,
}

impl BsInputs {
    /// Zero rate, zero dividend inputs
    pub fn new(spot: f64, strike: f64, time: f64, vol: f64) -> Self {
        Self {
            spot,
            strike,
            time,
            rate: 0.0,
            div: 0.0,
            vol,
        }
    }

    pub fn with_rates(mut self, rate: f64, div: f64) -> Self {
        self.rate = rate;
        self.div = div;
        self
    }

    pub fn with_spot(mut self, spot: f64) -> Self {
        self.spot = spot;
        self
    }

    pub fn with_strike(mut self, strike: f64) -> Self {
        self.strike = strike;
        self
    }

    pub fn with_vol(mut self, vol: f64) -> Self {
        self.vol = vol;
        self
    }

    /// Spot, strike, time and vol are finite and strictly positive
    pub fn is_priceable(&self) -> bool {
        [self.spot, self.strike, self.time, self.vol]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
            && self.rate.is_finite()
            && self.div.is_finite()
    }

    /// Black-Scholes (d1, d2)
    pub fn d1_d2(&self) -> (f64, f64) {
        let sqrt_t = self.time.sqrt();
        let d1 = ((self.spot / self.strike).ln()
            + (self.rate - self.div + 0.5 * self.vol * self.vol) * self.time)
            / (self.vol * sqrt_t);
        (d1, d1 - self.vol * sqrt_t)
    }
}

/// Black-Scholes European price and Greeks.
///
/// Returns `None` when spot, strike, time or vol is not strictly positive,
/// so callers can carry an unpriced day instead of a NaN.
///
/// `vega_1pct` is the price change for one vol point (20% -> 21%) and
/// `theta_day` is the annual theta divided by `days_in_year`.
pub fn price_greeks(inputs: &BsInputs, option_type: OptionType, days_in_year: f64) -> Option<Greeks> {
    if !inputs.is_priceable() || !(days_in_year > 0.0) {
        return None;
    }

    let BsInputs {
        spot,
        strike,
        time,
        rate,
        div,
        vol,
    } = *inputs;

    let sqrt_t = time.sqrt();
    let (d1, d2) = inputs.d1_d2();
    let pdf_d1 = norm_pdf(d1);
    let disc_r = (-rate * time).exp();
    let disc_q = (-div * time).exp();

    let decay = -disc_q * spot * pdf_d1 * vol / (2.0 * sqrt_t);

    let (price, delta, theta_year) = match option_type {
        OptionType::Call => {
            let nd1 = norm_cdf(d1);
            let nd2 = norm_cdf(d2);
            (
                disc_q * spot * nd1 - disc_r * strike * nd2,
                disc_q * nd1,
                decay - rate * disc_r * strike * nd2 + div * disc_q * spot * nd1,
            )
        }
        OptionType::Put => {
            let nmd1 = norm_cdf(-d1);
            let nmd2 = norm_cdf(-d2);
            (
                disc_r * strike * nmd2 - disc_q * spot * nmd1,
                -disc_q * nmd1,
                decay + rate * disc_r * strike * nmd2 - div * disc_q * spot * nmd1,
            )
        }
    };

    // Gamma and vega are the same for call and put
    let gamma = disc_q * pdf_d1 / (spot * vol * sqrt_t);
    let vega_1pct = disc_q * spot * pdf_d1 * sqrt_t / 100.0;

    Some(Greeks::new(price, delta, gamma, vega_1pct, theta_year / days_in_year))
}

/// Black-Scholes European price
pub fn price(inputs: &BsInputs, option_type: OptionType) -> Option<f64> {
    price_greeks(inputs, option_type, 365.0).map(|g| g.price)
}

/// Long straddle: call + put at the same strike and expiry
pub fn straddle_greeks(inputs: &BsInputs, days_in_year: f64) -> Option<StraddleGreeks> {
    let call = price_greeks(inputs, OptionType::Call, days_in_year)?;
    let put = price_greeks(inputs, OptionType::Put, days_in_year)?;
    Some(StraddleGreeks::new(call, put))
}

/// Implied volatility solver using Newton-Raphson with bisection fallback.
///
/// `inputs.vol` is ignored.
pub fn implied_volatility(
    market_price: f64,
    inputs: &BsInputs,
    option_type: OptionType,
) -> LabResult<f64> {
    if !(market_price > 0.0) {
        return Err(LabError::numerical("Non-positive option price"));
    }
    if !(inputs.time > 0.0) {
        return Err(LabError::numerical("Non-positive time to expiry"));
    }
    if !(inputs.spot > 0.0 && inputs.strike > 0.0) {
        return Err(LabError::numerical("Non-positive spot or strike"));
    }

    let intrinsic = option_type.intrinsic(inputs.spot, inputs.strike);
    let df = (-inputs.rate * inputs.time).exp();
    if market_price < intrinsic * df * 0.99 {
        return Err(LabError::numerical("Price below intrinsic value"));
    }

    // Brenner-Subrahmanyam starting point
    let atm_approx = market_price / (0.4 * inputs.spot * inputs.time.sqrt());
    let mut vol = atm_approx.clamp(0.01, 3.0);

    let max_iter = 100;
    let tol = 1e-8;

    for _ in 0..max_iter {
        let Some(g) = price_greeks(&inputs.with_vol(vol), option_type, 365.0) else {
            break;
        };
        let diff = g.price - market_price;

        if diff.abs() < tol {
            return Ok(vol);
        }

        // vega_1pct is per vol point, Newton needs per unit of vol
        let vega = g.vega_1pct * 100.0;
        if vega.abs() < 1e-12 {
            break;
        }

        let new_vol = vol - diff / vega;
        if new_vol <= 0.0 || new_vol > 5.0 {
            break;
        }

        vol = new_vol;
    }

    bisection_iv(market_price, inputs, option_type)
}

/// Bisection method for IV (slower but more robust)
fn bisection_iv(market_price: f64, inputs: &BsInputs, option_type: OptionType) -> LabResult<f64> {
    let mut low = 0.001;
    let mut high = 5.0;
    let tol = 1e-8;
    let max_iter = 100;

    for _ in 0..max_iter {
        let mid = (low + high) / 2.0;
        let model = price(&inputs.with_vol(mid), option_type)
            .ok_or_else(|| LabError::numerical("Unpriceable inputs in IV bisection"))?;
        let diff = model - market_price;

        if diff.abs() < tol {
            return Ok(mid);
        }

        if diff > 0.0 {
            high = mid;
        } else {
            low = mid;
        }

        if (high - low) < tol {
            return Ok(mid);
        }
    }

    Err(LabError::numerical("IV solver did not converge"))
}

/// Implied volatility of a quoted straddle premium (call + put)
pub fn straddle_implied_volatility(premium: f64, inputs: &BsInputs) -> LabResult<f64> {
    if !(premium > 0.0) {
        return Err(LabError::numerical("Non-positive straddle premium"));
    }

    let value_at = |vol: f64| -> LabResult<f64> {
        straddle_greeks(&inputs.with_vol(vol), 365.0)
            .map(|s| s.total.price)
            .ok_or_else(|| LabError::numerical("Unpriceable straddle inputs"))
    };

    // Straddle value is monotone increasing in vol
    let mut low = 0.001;
    let mut high = 5.0;
    if premium < value_at(low)? || premium > value_at(high)? {
        return Err(LabError::numerical("Straddle premium outside model bounds"));
    }

    for _ in 0..200 {
        let mid = 0.5 * (low + high);
        if value_at(mid)? > premium {
            high = mid;
        } else {
            low = mid;
        }
        if high - low < 1e-10 {
            break;
        }
    }

    Ok(0.5 * (low + high))
}
