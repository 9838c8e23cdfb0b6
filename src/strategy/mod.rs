//! Periodic long straddle backtest
//!
//! Rolls an ATM straddle weekly or monthly, marks it to Black-Scholes every
//! day and optionally delta hedges with the underlying.

pub mod config;
pub mod schedule;
pub mod simulator;

pub use config::*;
pub use schedule::*;
pub use simulator::*;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of simulated trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeKind {
    /// Sell the expiring/rolled straddle at theoretical value
    RollClose,
    /// Buy a new ATM straddle
    RollOpen,
    /// Rebalance the share hedge
    HedgeTrade,
}

/// One simulated trade.
///
/// Roll events fill the option fields, hedge events the share fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    #[serde(alias = "datetime")]
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: TradeKind,
    #[serde(rename = "K")]
    pub strike: Option<f64>,
    pub expiry: Option<NaiveDate>,
    pub contracts: Option<f64>,
    /// Position value traded; None when the day had no sigma to price with
    pub option_value: Option<f64>,
    /// Shares bought (+) or sold (-)
    pub shares_trade: Option<f64>,
    pub shares_pos: Option<f64>,
    pub price: Option<f64>,
    pub cash_after: Option<f64>,
}

impl TradeEvent {
    pub fn roll(
        date: NaiveDate,
        kind: TradeKind,
        strike: f64,
        expiry: NaiveDate,
        contracts: f64,
        option_value: Option<f64>,
    ) -> Self {
        Self {
            date,
            kind,
            strike: Some(strike),
            expiry: Some(expiry),
            contracts: Some(contracts),
            option_value,
            shares_trade: None,
            shares_pos: None,
            price: None,
            cash_after: None,
        }
    }

    pub fn hedge(date: NaiveDate, shares_trade: f64, shares_pos: f64, price: f64, cash_after: f64) -> Self {
        Self {
            date,
            kind: TradeKind::HedgeTrade,
            strike: None,
            expiry: None,
            contracts: None,
            option_value: None,
            shares_trade: Some(shares_trade),
            shares_pos: Some(shares_pos),
            price: Some(price),
            cash_after: Some(cash_after),
        }
    }
}

/// End-of-day state of the backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRow {
    #[serde(alias = "datetime")]
    pub date: NaiveDate,
    /// Underlying close
    #[serde(rename = "S")]
    pub spot: f64,
    pub sigma: Option<f64>,
    #[serde(rename = "K")]
    pub strike: Option<f64>,
    pub expiry: Option<NaiveDate>,
    #[serde(rename = "T_years")]
    pub t_years: Option<f64>,
    pub contracts: f64,
    pub shares: f64,
    /// Price of one straddle (call + put), per unit of underlying
    pub opt_price_straddle: Option<f64>,
    /// Position value: price * contracts * multiplier
    pub opt_value: f64,
    /// Portfolio Greeks of the options, in shares / dollars
    pub delta_opt: f64,
    pub gamma_opt: f64,
    pub vega_1pct_opt: f64,
    pub theta_day_opt: f64,
    pub cash: f64,
    pub equity: f64,
}

/// Output of one backtest run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Simulation {
    pub daily: Vec<DailyRow>,
    pub trades: Vec<TradeEvent>,
}

impl Simulation {
    /// Trades of one kind, in order
    pub fn trades_of(&self, kind: TradeKind) -> impl Iterator<Item = &TradeEvent> {
        self.trades.iter().filter(move |t| t.kind == kind)
    }

    pub fn final_equity(&self) -> Option<f64> {
        self.daily.last().map(|r| r.equity)
    }
}
