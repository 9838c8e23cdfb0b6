//! Core data types
//!
//! Defines fundamental types:
//! - OptionType / ContractSpec: SPY vs SPX contract terms
//! - Greeks: price and sensitivities in report units
//! - Bar / VixBar / SigmaRow: daily market series

pub mod error;
pub mod greeks;
pub mod option;
pub mod series;

pub use error::*;
pub use greeks::*;
pub use option::*;
pub use series::*;
