//! Pricing and volatility models
//!
//! Implements:
//! - Black-Scholes (European price, Greeks, implied vol)
//! - Historical volatility and the HV/VIX sigma proxy

pub mod black_scholes;
pub mod volatility;

pub use black_scholes::*;
pub use volatility::*;
