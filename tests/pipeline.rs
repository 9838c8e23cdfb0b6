//! End-to-end run on synthetic CSV inputs

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use straddle_lab::analytics::load_daily_csv;
use straddle_lab::data::read_rows;
use straddle_lab::prelude::*;

fn business_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut d = start;
    while out.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d);
        }
        d += Duration::days(1);
    }
    out
}

/// Writes ~14 months of SPY-like closes and a VIX with gaps
fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let days = business_days(NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(), 300);

    let mut spy = String::from("date,close\n");
    let mut vix = String::from("date,vix_close\n");
    for (i, d) in days.iter().enumerate() {
        let x = i as f64;
        let close = 400.0 * (0.03 * (x / 7.0).sin() + 0.0005 * x).exp();
        spy.push_str(&format!("{},{:.4}\n", d, close));
        // VIX missing every 10th day; forward filled by the proxy
        if i % 10 != 3 {
            vix.push_str(&format!("{},{:.2}\n", d, 17.0 + 3.0 * (x / 11.0).cos()));
        }
    }

    let spy_path = dir.join("spy.csv");
    let vix_path = dir.join("vix.csv");
    fs::write(&spy_path, spy).unwrap();
    fs::write(&vix_path, vix).unwrap();
    (spy_path, vix_path)
}

fn config(dir: &Path) -> LabConfig {
    let (spy, vix) = write_inputs(dir);
    let mut config = LabConfig::spy();
    config.data = DataConfig::from_csv(spy, vix);
    config.out_dir = dir.join("results");
    config.hedge.rebalance_threshold = 5.0;
    config.execution.n_sims = 500;
    config
}

#[test]
fn test_run_all_writes_every_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let out_dir = config.out_dir.clone();

    let output = Pipeline::new(config).unwrap().run_all().unwrap();

    for name in [
        "spy_daily.csv",
        "vix_daily.csv",
        "spy_sigma_proxy_hv_vix.csv",
        "daily_nohedge.csv",
        "trades_nohedge.csv",
        "daily_deltahedged.csv",
        "trades_deltahedged.csv",
        "summary_metrics.csv",
        "equity_compare.csv",
        "drawdown_compare.csv",
        "rolling_vol_compare.csv",
        "returns_nohedge.csv",
        "hist_returns_deltahedged.csv",
        "execution_legging_summary.csv",
        "delta_neutral_option_summary.csv",
        "run_config.toml",
        "RUN_REPORT.md",
    ] {
        assert!(out_dir.join(name).exists(), "{} missing", name);
    }

    assert_eq!(output.sigma.len(), 300);
    assert_eq!(output.base.daily.len(), 300);
    assert_eq!(output.analytics.summary.len(), 2);
    assert!(!output.legging.is_empty());
    assert_eq!(output.delta_neutral.len(), 4);

    let report = fs::read_to_string(&output.report).unwrap();
    assert!(report.contains("| No Hedge |"));
    assert!(report.contains("| Delta-Hedged |"));
}

#[test]
fn test_backtest_accounting() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let initial_cash = config.initial_cash;
    let pipeline = Pipeline::new(config).unwrap();

    let data = pipeline.load_data().unwrap();
    let sigma = pipeline.sigma(&data).unwrap();
    let base = pipeline.run_base(&sigma).unwrap();
    let hedged = pipeline.run_hedged(&sigma).unwrap();

    // Day one is inside the HV warm-up: nothing is priced, nothing is paid
    assert_eq!(base.daily[0].equity, initial_cash);
    assert_eq!(hedged.daily[0].equity, initial_cash);

    // Same rolls in both runs, shares only in the hedged one
    assert_eq!(
        base.trades_of(TradeKind::RollOpen).count(),
        hedged.trades_of(TradeKind::RollOpen).count()
    );
    assert!(base.daily.iter().all(|r| r.shares == 0.0));
    assert!(hedged.trades_of(TradeKind::HedgeTrade).count() > 0);

    for row in &hedged.daily {
        let identity = row.cash + row.opt_value + row.shares * row.spot;
        assert!((row.equity - identity).abs() < 1e-6);
    }
}

#[test]
fn test_stages_from_saved_csv() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let out_dir = config.out_dir.clone();
    let pipeline = Pipeline::new(config).unwrap();

    let data = pipeline.load_data().unwrap();
    let sigma = pipeline.sigma(&data).unwrap();
    let base = pipeline.run_base(&sigma).unwrap();
    pipeline.write_simulation(&base, "nohedge").unwrap();

    // Daily and trade CSVs read back into the same rows
    let daily: Vec<DailyRow> = read_rows(&out_dir.join("daily_nohedge.csv")).unwrap();
    let trades: Vec<TradeEvent> = read_rows(&out_dir.join("trades_nohedge.csv")).unwrap();
    assert_eq!(daily.len(), base.daily.len());
    assert_eq!(trades.len(), base.trades.len());
    assert_eq!(trades[0].kind, base.trades[0].kind);

    let equity = load_daily_csv(&out_dir.join("daily_nohedge.csv")).unwrap();
    assert_eq!(equity.len(), 300);
    assert_eq!(equity[0].equity, base.daily[0].equity);

    // Legging from the reloaded rows matches legging from memory
    let reloaded = Simulation { daily, trades };
    let (from_disk, _) = pipeline.legging(&reloaded).unwrap();
    let (from_memory, _) = pipeline.legging(&base).unwrap();
    assert_eq!(from_disk.len(), from_memory.len());
}
