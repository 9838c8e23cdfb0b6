//! Delta neutralization with a second option
//!
//! Instead of trading shares, offset the straddle's delta with n units of
//! another option. The hedge option also carries gamma, vega and theta, so
//! the neutralized book keeps a different convexity profile than the bare
//! straddle.

use serde::{Deserialize, Serialize};

use crate::core::{Greeks, LabError, LabResult, OptionType};
use crate::models::{price_greeks, straddle_greeks, BsInputs};

/// Hedge options with |delta| below this cannot neutralize anything
const MIN_HEDGE_DELTA: f64 = 1e-8;

/// Straddle plus the option hedge that makes it delta neutral
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeltaNeutralResult {
    /// Units of the hedge option per straddle (negative = sold)
    pub n_hedge: f64,
    /// Straddle alone
    pub base: Greeks,
    /// One unit of the hedge option
    pub hedge: Greeks,
    /// base + n_hedge * hedge
    pub total: Greeks,
}

/// Neutralize a straddle struck at `inputs.strike` with an option struck at
/// `hedge_strike`. All Greeks are per unit of underlying.
pub fn delta_neutral_with_option(
    inputs: &BsInputs,
    hedge_strike: f64,
    hedge_type: OptionType,
    days_in_year: f64,
) -> LabResult<DeltaNeutralResult> {
    let base = straddle_greeks(inputs, days_in_year)
        .ok_or_else(|| LabError::pricing(format!("Cannot price straddle for {:?}", inputs)))?
        .total;
    let hedge = price_greeks(&inputs.with_strike(hedge_strike), hedge_type, days_in_year)
        .ok_or_else(|| LabError::pricing(format!("Cannot price hedge {} at {}", hedge_type, hedge_strike)))?;

    if hedge.delta.abs() < MIN_HEDGE_DELTA {
        return Err(LabError::numerical(format!(
            "Hedge {} at {} has no delta ({:e})",
            hedge_type, hedge_strike, hedge.delta
        )));
    }

    let n_hedge = -base.delta / hedge.delta;
    let total = base.add(&hedge.scale(n_hedge));

    Ok(DeltaNeutralResult {
        n_hedge,
        base,
        hedge,
        total,
    })
}

/// One row of the delta-neutral comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaNeutralScenario {
    pub scenario: String,
    #[serde(rename = "K_straddle")]
    pub k_straddle: f64,
    #[serde(rename = "K_hedge")]
    pub k_hedge: f64,
    pub hedge_type: OptionType,
    pub n_hedge: f64,
    pub total_delta: f64,
    pub base_gamma: f64,
    pub total_gamma: f64,
    pub base_vega_1pct: f64,
    pub total_vega_1pct: f64,
    pub base_theta_day: f64,
    pub total_theta_day: f64,
}

impl DeltaNeutralScenario {
    fn new(name: &str, inputs: &BsInputs, hedge_strike: f64, hedge_type: OptionType, r: &DeltaNeutralResult) -> Self {
        Self {
            scenario: name.to_string(),
            k_straddle: inputs.strike,
            k_hedge: hedge_strike,
            hedge_type,
            n_hedge: r.n_hedge,
            total_delta: r.total.delta,
            base_gamma: r.base.gamma,
            total_gamma: r.total.gamma,
            base_vega_1pct: r.base.vega_1pct,
            total_vega_1pct: r.total.vega_1pct,
            base_theta_day: r.base.theta_day,
            total_theta_day: r.total.theta_day,
        }
    }
}

/// Standard comparison: hedge an ATM straddle with an ATM call, ATM put,
/// 2% OTM call and 2% OTM put. Strikes are rounded to `strike_step`.
pub fn delta_neutral_scenarios(
    spot: f64,
    vol: f64,
    time: f64,
    rate: f64,
    div: f64,
    strike_step: f64,
    days_in_year: f64,
) -> LabResult<Vec<DeltaNeutralScenario>> {
    use crate::strategy::round_to_step;

    let k_atm = round_to_step(spot, strike_step);
    let inputs = BsInputs::new(spot, k_atm, time, vol).with_rates(rate, div);

    let cases = [
        ("Hedge CALL ATM", OptionType::Call, k_atm),
        ("Hedge PUT ATM", OptionType::Put, k_atm),
        ("Hedge CALL 2% OTM", OptionType::Call, round_to_step(spot * 1.02, strike_step)),
        ("Hedge PUT 2% OTM", OptionType::Put, round_to_step(spot * 0.98, strike_step)),
    ];

    cases
        .iter()
        .map(|&(name, hedge_type, k_hedge)| {
            let result = delta_neutral_with_option(&inputs, k_hedge, hedge_type, days_in_year)?;
            tracing::debug!(
                "{}: n_hedge={:.4} gamma {:.5} -> {:.5}",
                name,
                result.n_hedge,
                result.base.gamma,
                result.total.gamma
            );
            Ok(DeltaNeutralScenario::new(name, &inputs, k_hedge, hedge_type, &result))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> BsInputs {
        // Slightly ITM call side so the straddle has visible delta
        BsInputs::new(688.25, 680.0, 30.0 / 365.0, 0.125)
    }

    #[test]
    fn test_neutralizes_delta() {
        let r = delta_neutral_with_option(&inputs(), 688.0, OptionType::Call, 365.0).unwrap();

        assert!(r.base.delta > 0.0);
        // Positive straddle delta is offset by selling calls
        assert!(r.n_hedge < 0.0);
        assert!(r.total.delta.abs() < 1e-12);
    }

    #[test]
    fn test_put_hedge_is_bought() {
        let r = delta_neutral_with_option(&inputs(), 688.0, OptionType::Put, 365.0).unwrap();

        // Buying puts adds gamma and vega instead of removing them
        assert!(r.n_hedge > 0.0);
        assert!(r.total.gamma > r.base.gamma);
        assert!(r.total.vega_1pct > r.base.vega_1pct);
        assert!(r.total.delta.abs() < 1e-12);
    }

    #[test]
    fn test_zero_delta_hedge_rejected() {
        // Deep OTM call, tiny tenor: delta underflows
        let short = BsInputs::new(100.0, 100.0, 1.0 / 365.0, 0.1);
        assert!(delta_neutral_with_option(&short, 1000.0, OptionType::Call, 365.0).is_err());
    }

    #[test]
    fn test_standard_scenarios() {
        let rows = delta_neutral_scenarios(688.25, 0.125, 30.0 / 365.0, 0.0, 0.0, 1.0, 365.0).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].k_straddle, 688.0);
        assert_eq!(rows[2].k_hedge, 702.0);
        assert_eq!(rows[3].k_hedge, 674.0);
        for row in &rows {
            assert!(row.total_delta.abs() < 1e-10);
            // Base Greeks are the same straddle in every scenario
            assert_eq!(row.base_gamma, rows[0].base_gamma);
        }
    }
}
