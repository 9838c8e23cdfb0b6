//! End-to-end study
//!
//! `Pipeline` runs each stage on one `LabConfig`:
//! 1. load underlying and VIX closes (Yahoo or CSV)
//! 2. build the HV/VIX sigma proxy
//! 3. backtest the straddle unhedged and delta hedged
//! 4. compare both runs
//! 5. simulate legging cost on every opening of the unhedged run
//! 6. neutralize delta with a second option
//! 7. write the run report
//!
//! Stages can also be called one at a time, which is what the CLI does.

use std::fs;
use std::path::PathBuf;

use crate::analytics::{equity_points, run_analytics, AnalyticsOutput, RunLabels};
use crate::config::{DataSource, LabConfig};
use crate::core::{Bar, LabError, LabResult, SigmaRow, VixBar};
use crate::data::{read_bars, read_vix, write_rows, CachedFetcher};
use crate::execution::{legging_report, LeggingRow};
use crate::hedging::{delta_neutral_scenarios, DeltaNeutralScenario};
use crate::models::sigma_proxy_hv_vix;
use crate::report::{write_run_report, ReportSection};
use crate::strategy::{HedgeParams, Simulation, StraddleBacktest};

/// File suffix of the unhedged run
pub const BASE_SUFFIX: &str = "nohedge";
/// File suffix of the delta-hedged run
pub const HEDGED_SUFFIX: &str = "deltahedged";

/// Daily closes of the underlying and the VIX
#[derive(Debug, Clone, PartialEq)]
pub struct MarketData {
    pub bars: Vec<Bar>,
    pub vix: Vec<VixBar>,
}

/// Everything `run_all` produced
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub sigma: Vec<SigmaRow>,
    pub base: Simulation,
    pub hedged: Simulation,
    pub analytics: AnalyticsOutput,
    pub legging: Vec<LeggingRow>,
    pub delta_neutral: Vec<DeltaNeutralScenario>,
    pub report: PathBuf,
}

/// Study runner
pub struct Pipeline {
    config: LabConfig,
}

impl Pipeline {
    pub fn new(config: LabConfig) -> LabResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    fn out_path(&self, file: &str) -> PathBuf {
        self.config.out_dir.join(file)
    }

    /// Load closes from the configured source
    pub fn load_data(&self) -> LabResult<MarketData> {
        let data = &self.config.data;
        let (bars, vix) = match data.source {
            DataSource::Csv => {
                let (Some(spy), Some(vix)) = (&data.underlying_csv, &data.vix_csv) else {
                    return Err(LabError::config("CSV source needs underlying_csv and vix_csv"));
                };
                (read_bars(spy)?, read_vix(vix)?)
            }
            DataSource::Yahoo => {
                let fetcher = CachedFetcher::new(data.cache.clone())?;
                let symbol = self.config.contract().history_symbol;
                (fetcher.get_bars(&symbol, &data.range)?, fetcher.get_vix(&data.range)?)
            }
        };

        tracing::info!(
            "Market data: {} {} bars, {} VIX bars",
            bars.len(),
            self.config.underlying,
            vix.len()
        );
        Ok(MarketData { bars, vix })
    }

    /// Save the loaded closes as CSV
    pub fn write_market_data(&self, data: &MarketData) -> LabResult<Vec<PathBuf>> {
        let symbol = self.config.underlying.to_string().to_lowercase();
        let bars_path = self.out_path(&format!("{}_daily.csv", symbol));
        let vix_path = self.out_path("vix_daily.csv");
        write_rows(&bars_path, &data.bars)?;
        write_rows(&vix_path, &data.vix)?;
        Ok(vec![bars_path, vix_path])
    }

    /// HV/VIX sigma proxy on the underlying's dates
    pub fn sigma(&self, data: &MarketData) -> LabResult<Vec<SigmaRow>> {
        sigma_proxy_hv_vix(&data.bars, &data.vix, &self.config.sigma)
    }

    pub fn write_sigma(&self, rows: &[SigmaRow]) -> LabResult<PathBuf> {
        let symbol = self.config.underlying.to_string().to_lowercase();
        let path = self.out_path(&format!("{}_sigma_proxy_hv_vix.csv", symbol));
        write_rows(&path, rows)?;
        Ok(path)
    }

    fn backtest(&self, hedge: HedgeParams) -> StraddleBacktest {
        StraddleBacktest::new(
            self.config.straddle.clone(),
            self.config.pricing.clone(),
            hedge,
            self.config.initial_cash,
        )
    }

    /// Unhedged run
    pub fn run_base(&self, sigma: &[SigmaRow]) -> LabResult<Simulation> {
        self.backtest(HedgeParams::disabled()).run_on_sigma(sigma)
    }

    /// Hedged run; falls back to a delta-neutral hedge if the config disables it
    pub fn run_hedged(&self, sigma: &[SigmaRow]) -> LabResult<Simulation> {
        let mut hedge = self.config.hedge.clone();
        if !hedge.enabled {
            tracing::warn!("Hedge disabled in config; enabling it for the hedged run");
            hedge.enabled = true;
        }
        self.backtest(hedge).run_on_sigma(sigma)
    }

    /// Write `daily_<suffix>.csv` and `trades_<suffix>.csv`
    pub fn write_simulation(&self, sim: &Simulation, suffix: &str) -> LabResult<Vec<PathBuf>> {
        let daily = self.out_path(&format!("daily_{}.csv", suffix));
        let trades = self.out_path(&format!("trades_{}.csv", suffix));
        write_rows(&daily, &sim.daily)?;
        write_rows(&trades, &sim.trades)?;

        tracing::info!(
            "{}: {} days, {} trades, final equity {:.2}",
            suffix,
            sim.daily.len(),
            sim.trades.len(),
            sim.final_equity().unwrap_or(f64::NAN)
        );
        Ok(vec![daily, trades])
    }

    /// Compare the two runs
    pub fn analytics(&self, base: &Simulation, hedged: &Simulation) -> LabResult<AnalyticsOutput> {
        run_analytics(
            &equity_points(&base.daily),
            &equity_points(&hedged.daily),
            &self.config.analytics,
            &self.config.out_dir,
            &RunLabels::default(),
        )
    }

    /// Legging cost of every straddle opening
    pub fn legging(&self, sim: &Simulation) -> LabResult<(Vec<LeggingRow>, PathBuf)> {
        let rows = legging_report(
            &sim.trades,
            &sim.daily,
            &self.config.execution,
            &self.config.pricing,
            self.config.leg_order,
        )?;
        let path = self.out_path("execution_legging_summary.csv");
        write_rows(&path, &rows)?;
        Ok((rows, path))
    }

    /// Delta-neutral comparison at the configured (or last backtested) spot and sigma
    pub fn delta_neutral(&self, sim: Option<&Simulation>) -> LabResult<(Vec<DeltaNeutralScenario>, PathBuf)> {
        let dn = &self.config.delta_neutral;
        let last_priced = sim.and_then(|s| s.daily.iter().rev().find(|r| r.sigma.is_some()));

        let spot = dn
            .spot
            .or(last_priced.map(|r| r.spot))
            .ok_or_else(|| LabError::config("delta_neutral.spot is required without a backtest"))?;
        let sigma = dn
            .sigma
            .or(last_priced.and_then(|r| r.sigma))
            .ok_or_else(|| LabError::config("delta_neutral.sigma is required without a backtest"))?;

        let pricing = &self.config.pricing;
        let rows = delta_neutral_scenarios(
            spot,
            sigma,
            dn.days_to_expiry / pricing.days_in_year,
            pricing.risk_free_rate,
            pricing.dividend_yield,
            self.config.straddle.strike_round,
            pricing.days_in_year,
        )?;
        tracing::info!("Delta-neutral scenarios at S={:.2}, sigma={:.4}", spot, sigma);

        let path = self.out_path("delta_neutral_option_summary.csv");
        write_rows(&path, &rows)?;
        Ok((rows, path))
    }

    /// Run every stage and write the report
    pub fn run_all(&self) -> LabResult<RunOutput> {
        fs::create_dir_all(&self.config.out_dir)?;

        let data = self.load_data()?;
        let mut inputs = self.write_market_data(&data)?;
        let sigma = self.sigma(&data)?;
        inputs.push(self.write_sigma(&sigma)?);

        let base = self.run_base(&sigma)?;
        let base_files = self.write_simulation(&base, BASE_SUFFIX)?;
        let hedged = self.run_hedged(&sigma)?;
        let hedged_files = self.write_simulation(&hedged, HEDGED_SUFFIX)?;

        let analytics = self.analytics(&base, &hedged)?;
        let (legging, legging_path) = self.legging(&base)?;
        let (delta_neutral, dn_path) = self.delta_neutral(Some(&base))?;

        let config_path = self.out_path("run_config.toml");
        fs::write(&config_path, self.config.to_toml_string()?)?;

        let sections = vec![
            ReportSection::new("Inputs and sigma proxy", inputs),
            ReportSection::new(format!("Periodic long straddle ({})", self.config.underlying), base_files),
            ReportSection::new("Delta-hedged with the underlying", hedged_files),
            ReportSection::new("P&L analytics (plot-ready series)", analytics.files.clone()),
            ReportSection::new("Execution: combo vs legs", vec![legging_path]),
            ReportSection::new("Delta neutral with another option", vec![dn_path]),
            ReportSection::new("Configuration", vec![config_path]),
        ];
        let report = write_run_report(
            &self.config.out_dir,
            &self.config.contract(),
            base.daily.last().map(|r| r.spot),
            &analytics.summary,
            &sections,
        )?;

        Ok(RunOutput {
            sigma,
            base,
            hedged,
            analytics,
            legging,
            delta_neutral,
            report,
        })
    }
}
