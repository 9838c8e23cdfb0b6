//! Option Greeks
//!
//! Price and first/second order sensitivities in report-friendly units:
//! vega per +1 vol point and theta per calendar day.

use serde::{Deserialize, Serialize};

/// Price and Greeks of a single option (or an aggregate of options)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// Theoretical price
    pub price: f64,
    /// Delta: dV/dS
    pub delta: f64,
    /// Gamma: d²V/dS²
    pub gamma: f64,
    /// Vega: price change for +1% (0.01) in volatility
    pub vega_1pct: f64,
    /// Theta: price change for one day
    pub theta_day: f64,
}

impl Greeks {
    pub fn new(price: f64, delta: f64, gamma: f64, vega_1pct: f64, theta_day: f64) -> Self {
        Self {
            price,
            delta,
            gamma,
            vega_1pct,
            theta_day,
        }
    }

    /// Scale Greeks by a factor (e.g., contracts * multiplier)
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            price: self.price * factor,
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            vega_1pct: self.vega_1pct * factor,
            theta_day: self.theta_day * factor,
        }
    }

    /// Add two Greeks (for portfolio)
    pub fn add(&self, other: &Greeks) -> Self {
        Self {
            price: self.price + other.price,
            delta: self.delta + other.delta,
            gamma: self.gamma + other.gamma,
            vega_1pct: self.vega_1pct + other.vega_1pct,
            theta_day: self.theta_day + other.theta_day,
        }
    }
}

/// Long straddle = long call + long put at the same strike and expiry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StraddleGreeks {
    pub call: Greeks,
    pub put: Greeks,
    pub total: Greeks,
}

impl StraddleGreeks {
    pub fn new(call: Greeks, put: Greeks) -> Self {
        Self {
            call,
            put,
            total: call.add(&put),
        }
    }
}
