//! Option contract definitions
//!
//! Vanilla options and the contract specs of the two S&P 500 underlyings the
//! straddle can be run on: SPY (ETF, American, physically settled) and SPX
//! (index, European, cash settled).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::LabError;

/// Smallest time to expiry used for pricing, in years
pub const MIN_TIME_TO_EXPIRY: f64 = 1e-9;

/// Option type (Call or Put)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    #[serde(rename = "C", alias = "call", alias = "Call")]
    Call,
    #[serde(rename = "P", alias = "put", alias = "Put")]
    Put,
}

impl OptionType {
    /// Payoff direction: +1 for call, -1 for put
    pub fn phi(&self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }

    /// Intrinsic value at given spot
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionType::Call => (spot - strike).max(0.0),
            OptionType::Put => (strike - spot).max(0.0),
        }
    }
}

impl FromStr for OptionType {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "call" => Ok(OptionType::Call),
            "p" | "put" => Ok(OptionType::Put),
            other => Err(LabError::invalid_input(format!(
                "unknown option type '{}', expected C/P",
                other
            ))),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "C"),
            OptionType::Put => write!(f, "P"),
        }
    }
}

/// Exercise style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseStyle {
    European,
    American,
}

/// Settlement at expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Settlement {
    /// Delivery of the underlying shares
    Physical,
    /// Cash difference against the settlement value
    Cash,
}

/// Contract specification of an option underlying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Option root / underlying symbol
    pub symbol: String,
    /// Symbol used to download daily history for the underlying
    pub history_symbol: String,
    pub exercise: ExerciseStyle,
    pub settlement: Settlement,
    /// Contract multiplier (100 for both SPY and SPX)
    pub multiplier: f64,
    /// Listed strike spacing near the money
    pub strike_step: f64,
}

impl ContractSpec {
    /// SPY ETF options: American, physically settled, $1 strikes
    pub fn spy() -> Self {
        Self {
            symbol: "SPY".to_string(),
            history_symbol: "SPY".to_string(),
            exercise: ExerciseStyle::American,
            settlement: Settlement::Physical,
            multiplier: 100.0,
            strike_step: 1.0,
        }
    }

    /// SPX index options: European, cash settled, $5 strikes
    pub fn spx() -> Self {
        Self {
            symbol: "SPX".to_string(),
            history_symbol: "^GSPC".to_string(),
            exercise: ExerciseStyle::European,
            settlement: Settlement::Cash,
            multiplier: 100.0,
            strike_step: 5.0,
        }
    }

    /// Notional of one contract at the given underlying level
    pub fn notional(&self, spot: f64) -> f64 {
        spot * self.multiplier
    }

    /// Short legs can be assigned shares before expiry
    pub fn has_early_exercise_risk(&self) -> bool {
        self.exercise == ExerciseStyle::American && self.settlement == Settlement::Physical
    }
}

impl Default for ContractSpec {
    fn default() -> Self {
        Self::spy()
    }
}

/// Option contract specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    /// Underlying symbol (e.g., "SPY", "SPX")
    pub underlying: String,
    /// Strike price
    pub strike: f64,
    /// Expiration date
    pub expiry: NaiveDate,
    /// Option type (Call/Put)
    pub option_type: OptionType,
    /// Exercise style
    pub exercise: ExerciseStyle,
    /// Contract multiplier (e.g., 100 for equity options)
    pub multiplier: f64,
}

impl OptionContract {
    /// Contract on the given underlying spec
    pub fn new(spec: &ContractSpec, strike: f64, expiry: NaiveDate, option_type: OptionType) -> Self {
        Self {
            underlying: spec.symbol.clone(),
            strike,
            expiry,
            option_type,
            exercise: spec.exercise,
            multiplier: spec.multiplier,
        }
    }

    /// Time to expiry in years from given date, floored at `MIN_TIME_TO_EXPIRY`
    pub fn time_to_expiry(&self, from: NaiveDate, days_in_year: f64) -> f64 {
        year_fraction(from, self.expiry, days_in_year)
    }

}

/// Calendar-day year fraction between two dates, floored at `MIN_TIME_TO_EXPIRY`
pub fn year_fraction(from: NaiveDate, to: NaiveDate, days_in_year: f64) -> f64 {
    let days = (to - from).num_days() as f64;
    (days / days_in_year).max(MIN_TIME_TO_EXPIRY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_type() {
        assert_eq!(OptionType::Call.phi(), 1.0);
        assert_eq!(OptionType::Put.phi(), -1.0);

        assert_eq!(OptionType::Call.intrinsic(110.0, 100.0), 10.0);
        assert_eq!(OptionType::Put.intrinsic(90.0, 100.0), 10.0);
        assert_eq!(OptionType::Call.intrinsic(90.0, 100.0), 0.0);
    }

    #[test]
    fn test_option_type_parse() {
        assert_eq!("C".parse::<OptionType>().unwrap(), OptionType::Call);
        assert_eq!("put".parse::<OptionType>().unwrap(), OptionType::Put);
        assert!("straddle".parse::<OptionType>().is_err());
    }

    #[test]
    fn test_time_to_expiry() {
        let expiry = NaiveDate::from_ymd_opt(2025, 2, 14).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();

        let opt = OptionContract::new(&ContractSpec::spy(), 600.0, expiry, OptionType::Call);
        let tte = opt.time_to_expiry(today, 365.0);
        assert!((tte - 30.0 / 365.0).abs() < 1e-12);

        // Expired contracts floor instead of going negative
        let expired = opt.time_to_expiry(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), 365.0);
        assert_eq!(expired, MIN_TIME_TO_EXPIRY);
    }

    #[test]
    fn test_contract_specs() {
        let spy = ContractSpec::spy();
        let spx = ContractSpec::spx();

        assert!(spy.has_early_exercise_risk());
        assert!(!spx.has_early_exercise_risk());

        // SPX is roughly 10x SPY, so one SPX contract carries ~10x the notional
        assert!((spx.notional(6000.0) / spy.notional(600.0) - 10.0).abs() < 1e-9);
    }
}
