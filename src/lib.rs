//! # Straddle Lab - Periodic Long Straddle Backtester
//!
//! Backtests a long ATM straddle on SPY (or SPX), rolled weekly or monthly and
//! priced with Black-Scholes on a blended HV/VIX volatility.
//!
//! ## Overview
//!
//! A long straddle is long gamma and long vega and pays theta every day. The
//! study compares:
//! - **No hedge**: the raw straddle, whose P&L mixes direction and volatility
//! - **Delta hedged**: the same straddle with a share hedge rebalanced when
//!   delta leaves a band, which isolates the volatility bet
//!
//! ## Key Components
//!
//! - **Data**: Yahoo Finance daily closes or local CSV files
//! - **Volatility**: sigma = w * VIX/100 + (1 - w) * HV, clipped
//! - **Black-Scholes**: price and Greeks with a dividend yield
//! - **Strategy**: roll schedule, synthetic expiries, share hedge
//! - **Analytics**: CAGR, Sharpe, Sortino, drawdowns, rolling vol
//! - **Execution**: combo order vs legging in with a delay (Monte Carlo)
//! - **Hedging**: delta neutral with a second option
//!
//! ## Usage
//!
//! ```rust,no_run
//! use straddle_lab::prelude::*;
//!
//! let mut config = LabConfig::spy();
//! config.data = DataConfig::from_csv("data/spy.csv", "data/vix.csv");
//!
//! let pipeline = Pipeline::new(config).unwrap();
//! let data = pipeline.load_data().unwrap();
//! let sigma = pipeline.sigma(&data).unwrap();
//!
//! let base = pipeline.run_base(&sigma).unwrap();
//! let hedged = pipeline.run_hedged(&sigma).unwrap();
//! println!("final equity: {:?} vs {:?}", base.final_equity(), hedged.final_equity());
//! ```
//!
//! ## What This Does NOT Do
//!
//! - Use real option quotes (every price is theoretical)
//! - Price early exercise (SPY options are American; BS is European)
//! - Route orders to a broker

pub mod analytics;
pub mod config;
pub mod core;
pub mod data;
pub mod execution;
pub mod hedging;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod strategy;

/// Prelude with commonly used types
pub mod prelude {
    // Core types
    pub use crate::core::{
        Bar, ContractSpec, ExerciseStyle, Greeks, LabError, LabResult, OptionContract,
        OptionType, Settlement, SigmaRow, StraddleGreeks, VixBar,
    };

    // Models
    pub use crate::models::{
        hist_vol, implied_volatility, price as bs_price, price_greeks, sigma_proxy_hv_vix,
        straddle_greeks, BsInputs, SigmaProxyParams,
    };

    // Strategy
    pub use crate::strategy::{
        simulate_periodic_straddle, DailyRow, HedgeParams, PricingParams, RollFrequency,
        Simulation, StraddleBacktest, StraddleParams, TradeEvent, TradeKind,
    };

    // Analytics, execution, hedging
    pub use crate::analytics::{compute_metrics, run_analytics, AnalyticsConfig, Metrics};
    pub use crate::execution::{
        legging_report, price_straddle_combo, simulate_legging_cost, ExecutionParams, LegOrder,
    };
    pub use crate::hedging::{delta_neutral_with_option, DeltaNeutralResult};

    // Data and orchestration
    pub use crate::config::{DataConfig, DataSource, LabConfig, Underlying};
    pub use crate::data::{CacheConfig, CachedFetcher, YahooClient};
    pub use crate::pipeline::Pipeline;
}

// Re-export main types at crate root
pub use crate::config::LabConfig;
pub use crate::core::{LabError, LabResult};
pub use crate::pipeline::Pipeline;
