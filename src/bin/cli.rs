//! Straddle Lab CLI
//!
//! Command-line interface for the periodic straddle study.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use straddle_lab::analytics::{load_daily_csv, run_analytics, RunLabels};
use straddle_lab::data::read_rows;
use straddle_lab::models::{price_greeks, straddle_greeks, straddle_implied_volatility};
use straddle_lab::pipeline::{BASE_SUFFIX, HEDGED_SUFFIX};
use straddle_lab::prelude::*;

/// Periodic long straddle backtester (SPY / SPX)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML config file; defaults reproduce the SPY study
    #[arg(short, long, global = true, env = "STRADDLE_CONFIG")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,

    /// Underlying preset (SPY or SPX) when no config file is given
    #[arg(long, global = true)]
    underlying: Option<Underlying>,

    /// Read underlying closes from CSV instead of Yahoo
    #[arg(long, global = true, requires = "vix_csv")]
    underlying_csv: Option<PathBuf>,

    /// Read VIX closes from CSV instead of Yahoo
    #[arg(long, global = true, requires = "underlying_csv")]
    vix_csv: Option<PathBuf>,

    /// Yahoo history range (e.g. 1y, 5y, max)
    #[arg(long, global = true)]
    range: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download (or read) closes and save them with the sigma proxy
    Fetch,
    /// Run the unhedged and delta-hedged backtests
    Backtest {
        /// Roll frequency (W or M)
        #[arg(long)]
        roll: Option<RollFrequency>,
        /// Calendar days from roll to expiry
        #[arg(long)]
        expiry_days: Option<i64>,
        /// Hedge band in shares
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Metrics and plot-ready series from two daily CSVs
    Analytics {
        #[arg(long)]
        base: Option<PathBuf>,
        #[arg(long)]
        hedged: Option<PathBuf>,
    },
    /// Combo vs legging cost on every straddle opening
    Legging {
        #[arg(long)]
        trades: Option<PathBuf>,
        #[arg(long)]
        daily: Option<PathBuf>,
        /// Leg sent first (C_then_P or P_then_C)
        #[arg(long)]
        order: Option<LegOrder>,
    },
    /// Neutralize straddle delta with a second option
    DeltaNeutral {
        #[arg(long)]
        spot: f64,
        #[arg(long)]
        sigma: f64,
        #[arg(long, default_value_t = 30.0)]
        days: f64,
    },
    /// Black-Scholes price and Greeks of a call, put and straddle
    Price {
        #[arg(long)]
        spot: f64,
        /// Strike; defaults to ATM on the contract's strike grid
        #[arg(long)]
        strike: Option<f64>,
        #[arg(long)]
        vol: f64,
        /// Days to expiry (ignored with --expiry)
        #[arg(long, default_value_t = 30.0)]
        days: f64,
        /// Expiry date (YYYY-MM-DD), measured from today
        #[arg(long)]
        expiry: Option<NaiveDate>,
        #[arg(long, default_value_t = 0.0)]
        rate: f64,
        #[arg(long, default_value_t = 0.0)]
        div: f64,
        /// Straddle premium to back out implied vol from
        #[arg(long)]
        premium: Option<f64>,
    },
    /// Every stage plus RUN_REPORT.md
    RunAll,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("STRADDLE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("straddle_lab=info,straddle=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<LabConfig> {
    let mut config = match &cli.config {
        Some(path) => LabConfig::from_toml_file(path)?,
        None => LabConfig::for_underlying(cli.underlying.unwrap_or_default()),
    };

    if let (Some(_), Some(u)) = (&cli.config, cli.underlying) {
        if u != config.underlying {
            bail!("--underlying {} conflicts with the config file ({})", u, config.underlying);
        }
    }
    if let Some(out) = &cli.out {
        config.out_dir = out.clone();
    }
    if let (Some(spy), Some(vix)) = (&cli.underlying_csv, &cli.vix_csv) {
        let cache = config.data.cache.clone();
        config.data = DataConfig {
            cache,
            ..DataConfig::from_csv(spy, vix)
        };
    }
    if let Some(range) = &cli.range {
        config.data.range = range.clone();
    }

    config.validate()?;
    Ok(config)
}

fn print_greeks(label: &str, g: &Greeks) {
    println!(
        "  {:<9} price {:>9.4}  delta {:>8.4}  gamma {:>9.6}  vega/1% {:>8.4}  theta/day {:>8.4}",
        label, g.price, g.delta, g.gamma, g.vega_1pct, g.theta_day
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Fetch => {
            let pipeline = Pipeline::new(config)?;
            let data = pipeline.load_data()?;
            let mut files = pipeline.write_market_data(&data)?;
            files.push(pipeline.write_sigma(&pipeline.sigma(&data)?)?);
            for f in files {
                println!("Saved: {}", f.display());
            }
        }

        Command::Backtest {
            roll,
            expiry_days,
            threshold,
        } => {
            if let Some(roll) = roll {
                config.straddle.roll_frequency = roll;
            }
            if let Some(days) = expiry_days {
                config.straddle.expiry_target_days = days;
            }
            if let Some(t) = threshold {
                config.hedge.rebalance_threshold = t;
            }

            let pipeline = Pipeline::new(config)?;
            let data = pipeline.load_data()?;
            let sigma = pipeline.sigma(&data)?;
            pipeline.write_sigma(&sigma)?;

            let base = pipeline.run_base(&sigma)?;
            let hedged = pipeline.run_hedged(&sigma)?;
            for (sim, suffix) in [(&base, BASE_SUFFIX), (&hedged, HEDGED_SUFFIX)] {
                for f in pipeline.write_simulation(sim, suffix)? {
                    println!("Saved: {}", f.display());
                }
                println!(
                    "  {}: final equity {:.2}, {} rolls, {} hedge trades",
                    suffix,
                    sim.final_equity().unwrap_or(f64::NAN),
                    sim.trades_of(TradeKind::RollOpen).count(),
                    sim.trades_of(TradeKind::HedgeTrade).count()
                );
            }
        }

        Command::Analytics { base, hedged } => {
            let base = base.unwrap_or_else(|| config.out_dir.join(format!("daily_{}.csv", BASE_SUFFIX)));
            let hedged =
                hedged.unwrap_or_else(|| config.out_dir.join(format!("daily_{}.csv", HEDGED_SUFFIX)));

            let a = load_daily_csv(&base).with_context(|| format!("loading {}", base.display()))?;
            let b = load_daily_csv(&hedged).with_context(|| format!("loading {}", hedged.display()))?;
            let out = run_analytics(&a, &b, &config.analytics, &config.out_dir, &RunLabels::default())?;

            println!("{}", straddle_lab::report::metrics_table(&out.summary));
        }

        Command::Legging { trades, daily, order } => {
            if let Some(order) = order {
                config.leg_order = order;
            }
            let trades_path =
                trades.unwrap_or_else(|| config.out_dir.join(format!("trades_{}.csv", BASE_SUFFIX)));
            let daily_path =
                daily.unwrap_or_else(|| config.out_dir.join(format!("daily_{}.csv", BASE_SUFFIX)));

            let sim = Simulation {
                trades: read_rows(&trades_path)?,
                daily: read_rows(&daily_path)?,
            };
            let pipeline = Pipeline::new(config)?;
            let (rows, path) = pipeline.legging(&sim)?;

            println!("Saved: {}", path.display());
            for r in rows.iter().rev().take(5).rev() {
                println!(
                    "  {}  sigma {:.4}  legging extra mean {:.4}  total extra mean {:.2} p90 {:.2} p99 {:.2}",
                    r.date, r.sigma, r.legging_extra_mean, r.total_extra_mean, r.total_extra_p90, r.total_extra_p99
                );
            }
        }

        Command::DeltaNeutral { spot, sigma, days } => {
            config.delta_neutral.spot = Some(spot);
            config.delta_neutral.sigma = Some(sigma);
            config.delta_neutral.days_to_expiry = days;

            let pipeline = Pipeline::new(config)?;
            let (rows, path) = pipeline.delta_neutral(None)?;

            println!("Saved: {}", path.display());
            for r in &rows {
                println!(
                    "  {:<18} K={:<7} n_hedge {:>8.4}  gamma {:.5} -> {:.5}  vega {:.4} -> {:.4}  theta {:.4} -> {:.4}",
                    r.scenario,
                    r.k_hedge,
                    r.n_hedge,
                    r.base_gamma,
                    r.total_gamma,
                    r.base_vega_1pct,
                    r.total_vega_1pct,
                    r.base_theta_day,
                    r.total_theta_day
                );
            }
        }

        Command::Price {
            spot,
            strike,
            vol,
            days,
            expiry,
            rate,
            div,
            premium,
        } => {
            let spec = config.contract();
            let strike = strike.unwrap_or_else(|| straddle_lab::strategy::round_to_step(spot, spec.strike_step));
            let days_in_year = config.pricing.days_in_year;

            let time = match expiry {
                Some(expiry) => {
                    let today = chrono::Local::now().date_naive();
                    OptionContract::new(&spec, strike, expiry, OptionType::Call).time_to_expiry(today, days_in_year)
                }
                None => days / days_in_year,
            };
            let inputs = BsInputs::new(spot, strike, time, vol).with_rates(rate, div);

            let call = price_greeks(&inputs, OptionType::Call, days_in_year);
            let put = price_greeks(&inputs, OptionType::Put, days_in_year);
            let (Some(call), Some(put)) = (call, put) else {
                bail!("inputs cannot be priced: {:?}", inputs);
            };

            println!("{} S={:.2} K={:.2} T={:.4}y vol={:.2}%", spec.symbol, spot, strike, time, vol * 100.0);
            print_greeks("call", &call);
            print_greeks("put", &put);
            if let Some(straddle) = straddle_greeks(&inputs, days_in_year) {
                print_greeks("straddle", &straddle.total);
                println!(
                    "  per contract: premium {:.2}, delta {:.1} shares",
                    straddle.total.price * spec.multiplier,
                    straddle.total.delta * spec.multiplier
                );
            }

            if let Some(premium) = premium {
                let iv = straddle_implied_volatility(premium, &inputs)?;
                println!("  implied vol of straddle premium {:.4}: {:.2}%", premium, iv * 100.0);
            }
        }

        Command::RunAll => {
            let pipeline = Pipeline::new(config)?;
            let output = pipeline.run_all()?;

            println!("{}", straddle_lab::report::metrics_table(&output.analytics.summary));
            println!("Report: {}", output.report.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_csv_flags_override_source() {
        let cli = Cli::parse_from([
            "straddle",
            "--underlying-csv",
            "spy.csv",
            "--vix-csv",
            "vix.csv",
            "--out",
            "tmp/out",
            "fetch",
        ]);
        let config = load_config(&cli).unwrap();

        assert_eq!(config.data.source, DataSource::Csv);
        assert_eq!(config.out_dir, PathBuf::from("tmp/out"));
        assert_eq!(config.data.vix_csv, Some(PathBuf::from("vix.csv")));
    }

    #[test]
    fn test_leg_order_flag() {
        let cli = Cli::parse_from(["straddle", "legging", "--order", "P_then_C"]);
        match cli.command {
            Command::Legging { order, .. } => assert_eq!(order, Some(LegOrder::PutThenCall)),
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["straddle", "legging", "--order", "sideways"]).is_err());
    }

    #[test]
    fn test_underlying_preset() {
        let cli = Cli::parse_from(["straddle", "--underlying", "SPX", "run-all"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.straddle.strike_round, 5.0);
    }
}
