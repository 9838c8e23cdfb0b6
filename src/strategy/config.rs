//! Configuration for the periodic straddle backtest

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{ContractSpec, LabError, LabResult};

/// How often the straddle is rolled into a fresh ATM strike
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollFrequency {
    /// First trading day of each ISO week
    #[serde(rename = "W", alias = "weekly")]
    Weekly,
    /// First trading day of each month
    #[serde(rename = "M", alias = "monthly")]
    Monthly,
}

impl FromStr for RollFrequency {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "w" | "weekly" => Ok(RollFrequency::Weekly),
            "m" | "monthly" => Ok(RollFrequency::Monthly),
            other => Err(LabError::invalid_input(format!(
                "roll frequency must be 'W' or 'M', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RollFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollFrequency::Weekly => write!(f, "W"),
            RollFrequency::Monthly => write!(f, "M"),
        }
    }
}

/// Longest tenor a synthetic expiry may target (about ten years)
pub const MAX_EXPIRY_TARGET_DAYS: i64 = 3650;

/// Roll schedule and size of the straddle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StraddleParams {
    /// Calendar days from roll date to expiry
    pub expiry_target_days: i64,
    pub roll_frequency: RollFrequency,
    /// Strike rounding step (1.0 for SPY, 5.0 for SPX)
    pub strike_round: f64,
    /// Number of straddles (call + put)
    pub contracts: u32,
    /// Contract multiplier
    pub multiplier: f64,
}

impl Default for StraddleParams {
    fn default() -> Self {
        Self {
            expiry_target_days: 30,
            roll_frequency: RollFrequency::Monthly,
            strike_round: 1.0,
            contracts: 1,
            multiplier: 100.0,
        }
    }
}

impl StraddleParams {
    /// Size and strike grid taken from a contract spec
    pub fn for_contract(spec: &ContractSpec) -> Self {
        Self {
            strike_round: spec.strike_step,
            multiplier: spec.multiplier,
            ..Default::default()
        }
    }

    /// Tenor must be 1..=MAX_EXPIRY_TARGET_DAYS and the size at least one
    /// contract.
    pub fn validate(&self) -> LabResult<()> {
        if !(1..=MAX_EXPIRY_TARGET_DAYS).contains(&self.expiry_target_days) {
            return Err(LabError::config(format!(
                "straddle.expiry_target_days must be in 1..={}, got {}",
                MAX_EXPIRY_TARGET_DAYS, self.expiry_target_days
            )));
        }
        if self.contracts == 0 {
            return Err(LabError::config("straddle.contracts must be at least 1"));
        }
        Ok(())
    }

    /// Units of underlying per unit of option Greek
    pub fn position_size(&self) -> f64 {
        self.contracts as f64 * self.multiplier
    }
}

/// Black-Scholes inputs and the fallback historical vol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingParams {
    /// HV window used when no sigma column is supplied
    pub vol_window: usize,
    pub vol_annualization: f64,
    pub risk_free_rate: f64,
    pub dividend_yield: f64,
    /// Calendar days per year for time to expiry and theta
    pub days_in_year: f64,
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            vol_window: 20,
            vol_annualization: 252.0,
            risk_free_rate: 0.0,
            dividend_yield: 0.0,
            days_in_year: 365.0,
        }
    }
}

/// Delta hedge in the underlying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgeParams {
    pub enabled: bool,
    /// Target portfolio delta, in shares
    pub target_delta: f64,
    /// Rehedge when |delta - target| exceeds this many shares
    pub rebalance_threshold: f64,
}

impl Default for HedgeParams {
    fn default() -> Self {
        Self {
            enabled: false,
            target_delta: 0.0,
            rebalance_threshold: 0.05,
        }
    }
}

impl HedgeParams {
    /// No hedging
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Hedge to delta neutral with a band in shares.
    ///
    /// One straddle times 100 carries deltas of tens of shares, so bands are
    /// sized in shares, not in per-option delta.
    pub fn delta_neutral(rebalance_threshold: f64) -> Self {
        Self {
            enabled: true,
            target_delta: 0.0,
            rebalance_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_frequency_parse() {
        assert_eq!("M".parse::<RollFrequency>().unwrap(), RollFrequency::Monthly);
        assert_eq!("weekly".parse::<RollFrequency>().unwrap(), RollFrequency::Weekly);
        assert!("D".parse::<RollFrequency>().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let params: StraddleParams = toml::from_str("roll_frequency = \"W\"\ncontracts = 3").unwrap();
        assert_eq!(params.roll_frequency, RollFrequency::Weekly);
        assert_eq!(params.contracts, 3);
        assert_eq!(params.expiry_target_days, 30);
        assert_eq!(params.position_size(), 300.0);
    }

    #[test]
    fn test_validate_bounds_tenor() {
        let mut params = StraddleParams::default();
        assert!(params.validate().is_ok());

        params.expiry_target_days = MAX_EXPIRY_TARGET_DAYS;
        assert!(params.validate().is_ok());

        for days in [0, -5, MAX_EXPIRY_TARGET_DAYS + 1, 4_000_000_000, i64::MAX] {
            params.expiry_target_days = days;
            assert!(params.validate().is_err(), "{} days accepted", days);
        }

        let params = StraddleParams {
            contracts: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_spx_sizing() {
        let params = StraddleParams::for_contract(&ContractSpec::spx());
        assert_eq!(params.strike_round, 5.0);
        assert_eq!(params.multiplier, 100.0);
    }
}
