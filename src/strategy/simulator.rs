//! StraddleBacktest - periodic long straddle with optional delta hedge
//!
//! Each day, in order:
//! 1. Roll: on a roll date, when flat, or at/after expiry, close the old
//!    straddle at theoretical value and buy a new ATM one.
//! 2. Mark to market at Black-Scholes value with the day's sigma.
//! 3. Hedge: if enabled and portfolio delta drifts outside the band, trade
//!    the underlying back to the target.
//! 4. Equity = cash + option value + shares * spot.
//!
//! There are no fees or slippage here; see `execution` for those.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::core::{year_fraction, Bar, Greeks, LabError, LabResult, SigmaRow};
use crate::models::{hist_vol, straddle_greeks, BsInputs};

use super::{
    pick_expiry_date, roll_dates, round_to_step, DailyRow, HedgeParams, PricingParams, Simulation,
    StraddleParams, TradeEvent, TradeKind,
};

/// Currently held straddle
#[derive(Debug, Clone, Copy, PartialEq)]
struct OpenStraddle {
    strike: f64,
    expiry: NaiveDate,
}

/// Periodic straddle simulator
#[derive(Debug, Clone)]
pub struct StraddleBacktest {
    straddle: StraddleParams,
    pricing: PricingParams,
    hedge: HedgeParams,
    initial_cash: f64,
}

impl StraddleBacktest {
    pub fn new(
        straddle: StraddleParams,
        pricing: PricingParams,
        hedge: HedgeParams,
        initial_cash: f64,
    ) -> Self {
        Self {
            straddle,
            pricing,
            hedge,
            initial_cash,
        }
    }

    pub fn straddle(&self) -> &StraddleParams {
        &self.straddle
    }

    pub fn pricing(&self) -> &PricingParams {
        &self.pricing
    }

    pub fn hedge(&self) -> &HedgeParams {
        &self.hedge
    }

    /// Run on closes with an explicit sigma per bar.
    ///
    /// With `sigma = None` the rolling historical vol of the closes is used.
    pub fn run(&self, bars: &[Bar], sigma: Option<&[Option<f64>]>) -> LabResult<Simulation> {
        self.straddle.validate()?;
        if bars.is_empty() {
            return Err(LabError::data("No bars to backtest"));
        }

        let mut rows: Vec<(Bar, Option<f64>)> = match sigma {
            Some(s) => {
                if s.len() != bars.len() {
                    return Err(LabError::invalid_input(format!(
                        "sigma has {} values for {} bars",
                        s.len(),
                        bars.len()
                    )));
                }
                bars.iter().copied().zip(s.iter().copied()).collect()
            }
            None => {
                let mut sorted = bars.to_vec();
                sorted.sort_by_key(|b| b.date);
                let closes: Vec<f64> = sorted.iter().map(|b| b.close).collect();
                let hv = hist_vol(&closes, self.pricing.vol_window, self.pricing.vol_annualization);
                sorted.into_iter().zip(hv).collect()
            }
        };
        rows.sort_by_key(|(b, _)| b.date);

        Ok(self.simulate(&rows))
    }

    /// Run on the HV/VIX proxy rows, pricing with `sigma_proxy`
    pub fn run_on_sigma(&self, rows: &[SigmaRow]) -> LabResult<Simulation> {
        let bars: Vec<Bar> = rows.iter().map(|r| r.bar()).collect();
        let sigma: Vec<Option<f64>> = rows.iter().map(|r| r.sigma_proxy).collect();
        self.run(&bars, Some(&sigma))
    }

    fn simulate(&self, rows: &[(Bar, Option<f64>)]) -> Simulation {
        let dates: Vec<NaiveDate> = rows.iter().map(|(b, _)| b.date).collect();
        let rolls: BTreeSet<NaiveDate> = roll_dates(&dates, self.straddle.roll_frequency);

        let size = self.straddle.position_size();
        let contracts = self.straddle.contracts as f64;

        let mut position: Option<OpenStraddle> = None;
        let mut shares = 0.0;
        let mut cash = self.initial_cash;

        let mut daily = Vec::with_capacity(rows.len());
        let mut trades = Vec::new();

        for &(bar, sigma) in rows {
            let date = bar.date;
            let spot = bar.close;
            let sigma = sigma.filter(|s| s.is_finite());

            // 1) Roll
            let expired = position.map_or(true, |p| date >= p.expiry);
            if rolls.contains(&date) || expired {
                if let Some(old) = position.take() {
                    let value = self
                        .mark(old, date, spot, sigma)
                        .map(|(g, _)| g.price * size);
                    if let Some(v) = value {
                        cash += v;
                    }
                    trades.push(TradeEvent::roll(
                        date,
                        TradeKind::RollClose,
                        old.strike,
                        old.expiry,
                        contracts,
                        value,
                    ));
                }

                let new = OpenStraddle {
                    strike: round_to_step(spot, self.straddle.strike_round),
                    expiry: pick_expiry_date(date, self.straddle.expiry_target_days),
                };
                let premium = self
                    .mark(new, date, spot, sigma)
                    .map(|(g, _)| g.price * size);
                if let Some(p) = premium {
                    cash -= p;
                }
                trades.push(TradeEvent::roll(
                    date,
                    TradeKind::RollOpen,
                    new.strike,
                    new.expiry,
                    contracts,
                    premium,
                ));
                tracing::debug!(
                    "{} roll: K={} expiry={} premium={:?}",
                    date,
                    new.strike,
                    new.expiry,
                    premium
                );
                position = Some(new);
            }

            // 2) Mark to market
            let marked = position.and_then(|p| self.mark(p, date, spot, sigma));
            let (unit, t_years) = match marked {
                Some((g, t)) => (Some(g), Some(t)),
                None => (None, None),
            };
            let book = unit.map(|g| g.scale(size)).unwrap_or_default();
            let opt_value = book.price;

            // 3) Delta hedge
            if self.hedge.enabled && position.is_some() {
                let total_delta = book.delta + shares;
                if (total_delta - self.hedge.target_delta).abs() > self.hedge.rebalance_threshold {
                    let desired = self.hedge.target_delta - book.delta;
                    let trade = desired - shares;
                    cash -= trade * spot;
                    shares = desired;
                    trades.push(TradeEvent::hedge(date, trade, shares, spot, cash));
                }
            }

            // 4) Equity
            let equity = cash + opt_value + shares * spot;

            daily.push(DailyRow {
                date,
                spot,
                sigma,
                strike: position.map(|p| p.strike),
                expiry: position.map(|p| p.expiry),
                t_years,
                contracts,
                shares,
                opt_price_straddle: unit.map(|g| g.price),
                opt_value,
                delta_opt: book.delta,
                gamma_opt: book.gamma,
                vega_1pct_opt: book.vega_1pct,
                theta_day_opt: book.theta_day,
                cash,
                equity,
            });
        }

        let sim = Simulation { daily, trades };
        if let (Some(first), Some(last)) = (sim.daily.first(), sim.daily.last()) {
            tracing::info!(
                "Backtest {} -> {} (hedge {}): equity {:.2} -> {:.2}, {} trades",
                first.date,
                last.date,
                if self.hedge.enabled { "on" } else { "off" },
                first.equity,
                last.equity,
                sim.trades.len()
            );
        }
        sim
    }

    /// Per-straddle Greeks and time to expiry, None without a usable sigma
    fn mark(
        &self,
        pos: OpenStraddle,
        date: NaiveDate,
        spot: f64,
        sigma: Option<f64>,
    ) -> Option<(Greeks, f64)> {
        let sigma = sigma?;
        let t = year_fraction(date, pos.expiry, self.pricing.days_in_year);
        let inputs = BsInputs::new(spot, pos.strike, t, sigma)
            .with_rates(self.pricing.risk_free_rate, self.pricing.dividend_yield);
        straddle_greeks(&inputs, self.pricing.days_in_year).map(|s| (s.total, t))
    }
}

/// Functional entry point: periodic long straddle, optionally delta hedged
pub fn simulate_periodic_straddle(
    bars: &[Bar],
    sigma: Option<&[Option<f64>]>,
    straddle: &StraddleParams,
    pricing: &PricingParams,
    hedge: &HedgeParams,
    initial_cash: f64,
) -> LabResult<Simulation> {
    StraddleBacktest::new(straddle.clone(), pricing.clone(), hedge.clone(), initial_cash)
        .run(bars, sigma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration};

    /// Weekday-only series with a deterministic zig-zag trend
    fn make_bars(n: usize) -> Vec<Bar> {
        let mut date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut out = Vec::with_capacity(n);
        let mut price = 470.0;
        while out.len() < n {
            if date.weekday().number_from_monday() <= 5 {
                let i = out.len() as f64;
                price *= 1.0 + 0.004 * (i * 0.7).sin() + 0.0005;
                out.push(Bar::new(date, price));
            }
            date += Duration::days(1);
        }
        out
    }

    fn flat_sigma(n: usize, s: f64) -> Vec<Option<f64>> {
        vec![Some(s); n]
    }

    fn backtest(hedge: HedgeParams) -> StraddleBacktest {
        StraddleBacktest::new(
            StraddleParams::default(),
            PricingParams::default(),
            hedge,
            100_000.0,
        )
    }

    #[test]
    fn test_first_day_equity_equals_cash() {
        let bars = make_bars(60);
        let sim = backtest(HedgeParams::disabled())
            .run(&bars, Some(&flat_sigma(60, 0.15)))
            .unwrap();

        let first = &sim.daily[0];
        // Premium paid equals the position value on the day it is bought
        assert!((first.equity - 100_000.0).abs() < 1e-6);
        assert!(first.cash < 100_000.0);
        assert_eq!(sim.trades[0].kind, TradeKind::RollOpen);
    }

    #[test]
    fn test_monthly_rolls_close_then_open() {
        // Jan 2 .. Mar 4 2024; each 30-day expiry lands on the next roll date
        let bars = make_bars(45);
        let sim = backtest(HedgeParams::disabled())
            .run(&bars, Some(&flat_sigma(45, 0.15)))
            .unwrap();

        let opens = sim.trades_of(TradeKind::RollOpen).count();
        let closes = sim.trades_of(TradeKind::RollClose).count();
        assert_eq!(opens, 3);
        assert_eq!(closes, opens - 1);

        // Every close is immediately followed by an open on the same day
        for (i, t) in sim.trades.iter().enumerate() {
            if t.kind == TradeKind::RollClose {
                assert_eq!(sim.trades[i + 1].kind, TradeKind::RollOpen);
                assert_eq!(sim.trades[i + 1].date, t.date);
            }
        }
    }

    #[test]
    fn test_expiry_forces_roll_before_next_month() {
        // 10-day tenor expires well before the next monthly roll
        let params = StraddleParams {
            expiry_target_days: 10,
            ..Default::default()
        };
        let bt = StraddleBacktest::new(params, PricingParams::default(), HedgeParams::disabled(), 0.0);
        let bars = make_bars(20);
        let sim = bt.run(&bars, Some(&flat_sigma(20, 0.2))).unwrap();

        assert!(sim.trades_of(TradeKind::RollOpen).count() >= 2);
        for row in &sim.daily {
            assert!(row.expiry.unwrap() >= row.date);
        }
    }

    #[test]
    fn test_unhedged_has_no_shares() {
        let bars = make_bars(40);
        let sim = backtest(HedgeParams::disabled()).run(&bars, None).unwrap();

        assert!(sim.daily.iter().all(|r| r.shares == 0.0));
        assert!(sim.trades_of(TradeKind::HedgeTrade).next().is_none());
    }

    #[test]
    fn test_hist_vol_fallback_warmup_is_unpriced() {
        let bars = make_bars(40);
        let sim = backtest(HedgeParams::disabled()).run(&bars, None).unwrap();

        // First 20 days have no HV: nothing priced, cash untouched
        assert!(sim.daily[0].sigma.is_none());
        assert_eq!(sim.daily[0].opt_value, 0.0);
        assert_eq!(sim.daily[0].cash, 100_000.0);
        assert!(sim.trades[0].option_value.is_none());
        assert!(sim.daily[25].sigma.is_some());
    }

    #[test]
    fn test_hedge_keeps_delta_inside_band() {
        let bars = make_bars(80);
        let sim = backtest(HedgeParams::delta_neutral(5.0))
            .run(&bars, Some(&flat_sigma(80, 0.15)))
            .unwrap();

        assert!(sim.trades_of(TradeKind::HedgeTrade).count() > 0);
        for row in &sim.daily {
            assert!((row.delta_opt + row.shares).abs() <= 5.0 + 1e-9);
        }
    }

    #[test]
    fn test_equity_identity() {
        let bars = make_bars(50);
        let sim = backtest(HedgeParams::delta_neutral(1.0))
            .run(&bars, Some(&flat_sigma(50, 0.2)))
            .unwrap();

        for row in &sim.daily {
            let rebuilt = row.cash + row.opt_value + row.shares * row.spot;
            assert!((rebuilt - row.equity).abs() < 1e-6);
        }
    }

    #[test]
    fn test_input_validation() {
        let bt = backtest(HedgeParams::disabled());
        assert!(bt.run(&[], None).is_err());

        let bars = make_bars(5);
        assert!(bt.run(&bars, Some(&flat_sigma(4, 0.2))).is_err());
    }

    #[test]
    fn test_out_of_range_tenor_is_rejected() {
        let params = StraddleParams {
            expiry_target_days: 4_000_000_000,
            ..Default::default()
        };
        let bt = StraddleBacktest::new(params, PricingParams::default(), HedgeParams::disabled(), 0.0);
        let bars = make_bars(5);

        let err = bt.run(&bars, Some(&flat_sigma(5, 0.2))).unwrap_err();
        assert!(matches!(err, LabError::Config(_)));
    }

    #[test]
    fn test_hedge_flattens_when_sigma_drops_out() {
        let n = 80;
        let bars = make_bars(n);
        let hedge = HedgeParams::delta_neutral(1.0);
        let full = backtest(hedge.clone())
            .run(&bars, Some(&flat_sigma(n, 0.15)))
            .unwrap();

        // First day carrying a hedge larger than the band
        let i = full
            .daily
            .iter()
            .take(n - 1)
            .position(|r| r.shares.abs() > 1.0)
            .unwrap();
        let held = full.daily[i].shares;

        // Same path, but no sigma the next day: the option book has no
        // delta, so the shares go back to the target
        let mut sigma = flat_sigma(n, 0.15);
        sigma[i + 1] = None;
        let sim = backtest(hedge).run(&bars, Some(&sigma)).unwrap();

        assert_eq!(sim.daily[i].shares, held);
        let gap = &sim.daily[i + 1];
        assert!(gap.opt_price_straddle.is_none());
        assert_eq!(gap.delta_opt, 0.0);
        assert_eq!(gap.shares, 0.0);

        let flatten = sim
            .trades_of(TradeKind::HedgeTrade)
            .find(|t| t.date == gap.date)
            .unwrap();
        assert_eq!(flatten.shares_trade, Some(-held));
        assert_eq!(flatten.shares_pos, Some(0.0));
    }

    #[test]
    fn test_unsorted_bars_are_sorted() {
        let mut bars = make_bars(30);
        let sigma: Vec<Option<f64>> = (0..30).map(|i| Some(0.1 + i as f64 * 0.001)).collect();
        let expected_first_sigma = sigma[0];
        let mut paired: Vec<_> = bars.iter().copied().zip(sigma.iter().copied()).collect();
        paired.reverse();
        bars = paired.iter().map(|(b, _)| *b).collect();
        let reversed: Vec<Option<f64>> = paired.iter().map(|(_, s)| *s).collect();

        let sim = backtest(HedgeParams::disabled()).run(&bars, Some(&reversed)).unwrap();
        assert!(sim.daily.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(sim.daily[0].sigma, expected_first_sigma);
    }
}
