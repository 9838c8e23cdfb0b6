//! Order execution: combo vs legging in
//!
//! Opening the straddle as a single combo order pays one slippage on the
//! package. Legging in (one leg, a delay, then the other) pays a wider
//! per-leg slippage and exposes the second leg to the underlying's move
//! during the delay. The legging cost is simulated by Monte Carlo.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::core::{year_fraction, LabError, LabResult, OptionType};
use crate::models::{price_greeks, straddle_greeks, BsInputs};
use crate::strategy::{DailyRow, PricingParams, TradeEvent, TradeKind};

/// Execution cost parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionParams {
    /// Slippage on the combo price, in basis points
    pub slippage_bps_combo: f64,
    /// Slippage when working each leg separately, in basis points
    pub slippage_bps_leg: f64,
    /// Delay between the two legs
    pub leg_delay_seconds: f64,
    pub n_sims: usize,
    pub seed: u64,
    pub multiplier: f64,
    pub contracts: u32,
    pub seconds_in_year: f64,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            slippage_bps_combo: 1.0,
            slippage_bps_leg: 2.0,
            leg_delay_seconds: 2.0,
            n_sims: 5000,
            seed: 123,
            multiplier: 100.0,
            contracts: 1,
            seconds_in_year: 365.0 * 24.0 * 60.0 * 60.0,
        }
    }
}

impl ExecutionParams {
    fn position_size(&self) -> f64 {
        self.contracts as f64 * self.multiplier
    }
}

/// Which leg is sent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LegOrder {
    #[default]
    #[serde(rename = "C_then_P")]
    CallThenPut,
    #[serde(rename = "P_then_C")]
    PutThenCall,
}

impl FromStr for LegOrder {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c_then_p" | "call_first" | "call" => Ok(LegOrder::CallThenPut),
            "p_then_c" | "put_first" | "put" => Ok(LegOrder::PutThenCall),
            other => Err(LabError::invalid_input(format!(
                "leg order must be C_then_P or P_then_C, got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for LegOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegOrder::CallThenPut => write!(f, "C_then_P"),
            LegOrder::PutThenCall => write!(f, "P_then_C"),
        }
    }
}

/// Price after paying `bps` basis points of slippage
pub fn apply_slippage(price: f64, bps: f64) -> f64 {
    price * (1.0 + bps / 10_000.0)
}

/// Straddle executed as one combo order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComboPrice {
    /// Theoretical call + put
    pub raw_straddle: f64,
    /// After combo slippage
    pub exec_straddle: f64,
    /// exec_straddle * contracts * multiplier
    pub total_cost: f64,
}

/// Execution price of the straddle as a combo (no legging)
pub fn price_straddle_combo(inputs: &BsInputs, params: &ExecutionParams) -> LabResult<ComboPrice> {
    let straddle = straddle_greeks(inputs, 365.0)
        .ok_or_else(|| LabError::pricing(format!("Cannot price straddle for {:?}", inputs)))?;

    let raw = straddle.total.price;
    let exec = apply_slippage(raw, params.slippage_bps_combo);

    Ok(ComboPrice {
        raw_straddle: raw,
        exec_straddle: exec,
        total_cost: exec * params.position_size(),
    })
}

/// Distribution of the legging cost versus the combo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeggingCost {
    pub combo_exec: f64,
    pub legs_exec_mean: f64,
    pub legging_extra_mean: f64,
    pub legging_extra_p50: f64,
    pub legging_extra_p90: f64,
    pub legging_extra_p99: f64,
    pub total_cost_legs_mean: f64,
    pub total_extra_mean: f64,
    pub total_extra_p90: f64,
    pub total_extra_p99: f64,
}

/// Simulate opening the straddle leg by leg with a delay.
///
/// The underlying moves by dS ~ N(0, S * sigma * sqrt(dt)) between legs;
/// the first leg fills at S, the second at S + dS.
pub fn simulate_legging_cost(
    inputs: &BsInputs,
    params: &ExecutionParams,
    order: LegOrder,
) -> LabResult<LeggingCost> {
    if params.n_sims == 0 {
        return Err(LabError::invalid_input("n_sims must be positive"));
    }

    let combo = price_straddle_combo(inputs, params)?;

    let leg = |spot: f64, option_type: OptionType| -> LabResult<f64> {
        price_greeks(&inputs.with_spot(spot), option_type, 365.0)
            .map(|g| g.price)
            .ok_or_else(|| LabError::pricing(format!("Cannot price {} leg at spot {}", option_type, spot)))
    };

    let (first_type, second_type) = match order {
        LegOrder::CallThenPut => (OptionType::Call, OptionType::Put),
        LegOrder::PutThenCall => (OptionType::Put, OptionType::Call),
    };
    let first_leg = leg(inputs.spot, first_type)?;

    let dt_years = params.leg_delay_seconds / params.seconds_in_year;
    let move_std = inputs.spot * inputs.vol * dt_years.sqrt();
    let normal = Normal::new(0.0, move_std)
        .map_err(|e| LabError::numerical(format!("Invalid spot move distribution: {}", e)))?;
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

    let mut extra = Vec::with_capacity(params.n_sims);
    let mut legs_sum = 0.0;
    for _ in 0..params.n_sims {
        let moved = inputs.spot + normal.sample(&mut rng);
        let raw_legs = first_leg + leg(moved, second_type)?;
        let exec_legs = apply_slippage(raw_legs, params.slippage_bps_leg);
        legs_sum += exec_legs;
        extra.push(exec_legs - combo.exec_straddle);
    }

    let n = params.n_sims as f64;
    let size = params.position_size();
    let legs_mean = legs_sum / n;
    let extra_mean = extra.iter().sum::<f64>() / n;

    extra.sort_by(|a, b| a.total_cmp(b));
    let p50 = percentile_sorted(&extra, 50.0);
    let p90 = percentile_sorted(&extra, 90.0);
    let p99 = percentile_sorted(&extra, 99.0);

    Ok(LeggingCost {
        combo_exec: combo.exec_straddle,
        legs_exec_mean: legs_mean,
        legging_extra_mean: extra_mean,
        legging_extra_p50: p50,
        legging_extra_p90: p90,
        legging_extra_p99: p99,
        total_cost_legs_mean: legs_mean * size,
        total_extra_mean: extra_mean * size,
        total_extra_p90: p90 * size,
        total_extra_p99: p99 * size,
    })
}

/// Percentile with linear interpolation between closest ranks.
///
/// `sorted` must be ascending and non-empty.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Legging cost of one simulated straddle opening
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeggingRow {
    pub date: NaiveDate,
    #[serde(rename = "S")]
    pub spot: f64,
    #[serde(rename = "K")]
    pub strike: f64,
    pub sigma: f64,
    #[serde(rename = "T_years")]
    pub t_years: f64,
    pub combo_exec: f64,
    pub legs_exec_mean: f64,
    pub legging_extra_mean: f64,
    pub legging_extra_p50: f64,
    pub legging_extra_p90: f64,
    pub legging_extra_p99: f64,
    pub total_cost_legs_mean: f64,
    pub total_extra_mean: f64,
    pub total_extra_p90: f64,
    pub total_extra_p99: f64,
}

impl LeggingRow {
    fn new(date: NaiveDate, inputs: &BsInputs, cost: LeggingCost) -> Self {
        Self {
            date,
            spot: inputs.spot,
            strike: inputs.strike,
            sigma: inputs.vol,
            t_years: inputs.time,
            combo_exec: cost.combo_exec,
            legs_exec_mean: cost.legs_exec_mean,
            legging_extra_mean: cost.legging_extra_mean,
            legging_extra_p50: cost.legging_extra_p50,
            legging_extra_p90: cost.legging_extra_p90,
            legging_extra_p99: cost.legging_extra_p99,
            total_cost_legs_mean: cost.total_cost_legs_mean,
            total_extra_mean: cost.total_extra_mean,
            total_extra_p90: cost.total_extra_p90,
            total_extra_p99: cost.total_extra_p99,
        }
    }
}

/// Legging cost for every straddle opening of a backtest.
///
/// Spot and sigma come from the daily row of the opening date. Openings on
/// days without a sigma are skipped.
pub fn legging_report(
    trades: &[TradeEvent],
    daily: &[DailyRow],
    params: &ExecutionParams,
    pricing: &PricingParams,
    order: LegOrder,
) -> LabResult<Vec<LeggingRow>> {
    let opens: Vec<&TradeEvent> = trades.iter().filter(|t| t.kind == TradeKind::RollOpen).collect();
    if opens.is_empty() {
        return Err(LabError::data("No ROLL_OPEN trades to simulate legging for"));
    }

    let mut rows = Vec::with_capacity(opens.len());
    for open in opens {
        let (Some(strike), Some(expiry)) = (open.strike, open.expiry) else {
            return Err(LabError::data(format!(
                "ROLL_OPEN on {} is missing strike or expiry",
                open.date
            )));
        };
        let day = daily
            .iter()
            .find(|r| r.date == open.date)
            .ok_or_else(|| LabError::data(format!("No daily row for ROLL_OPEN on {}", open.date)))?;

        let Some(sigma) = day.sigma else {
            tracing::debug!("Skipping legging on {}: no sigma", open.date);
            continue;
        };

        let t = year_fraction(open.date, expiry, pricing.days_in_year);
        let inputs = BsInputs::new(day.spot, strike, t, sigma)
            .with_rates(pricing.risk_free_rate, pricing.dividend_yield);
        let cost = simulate_legging_cost(&inputs, params, order)?;
        rows.push(LeggingRow::new(open.date, &inputs, cost));
    }

    rows.sort_by_key(|r| r.date);
    tracing::info!("Simulated legging cost for {} straddle openings", rows.len());
    Ok(rows)
}
