//! Roll calendar
//!
//! Without a historical option chain, expiries are synthetic: roll date plus
//! the target tenor, pulled back to Friday when that lands on a weekend.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use super::RollFrequency;

/// First available date of each month (or ISO week) in a daily index
pub fn roll_dates(dates: &[NaiveDate], freq: RollFrequency) -> BTreeSet<NaiveDate> {
    let mut first: BTreeMap<(i32, u32), NaiveDate> = BTreeMap::new();

    for &date in dates {
        let key = match freq {
            RollFrequency::Monthly => (date.year(), date.month()),
            RollFrequency::Weekly => {
                let iso = date.iso_week();
                (iso.year(), iso.week())
            }
        };
        first
            .entry(key)
            .and_modify(|d| {
                if date < *d {
                    *d = date;
                }
            })
            .or_insert(date);
    }

    first.into_values().collect()
}

/// Synthetic expiry: roll date + target days, moved back to Friday on weekends.
///
/// `target_days` is expected inside `StraddleParams::validate` bounds.
pub fn pick_expiry_date(roll_date: NaiveDate, target_days: i64) -> NaiveDate {
    let mut expiry = roll_date + Duration::days(target_days);
    while matches!(expiry.weekday(), Weekday::Sat | Weekday::Sun) {
        expiry -= Duration::days(1);
    }
    expiry
}

/// Round to the nearest multiple of `step`; non-positive steps leave x as is
pub fn round_to_step(x: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return x;
    }
    (x / step).round() * step
}
