//! Annual closing prices from a daily price feed.

use chrono::{Datelike, NaiveDate};
use metrica_types::{FiscalYear, TimeSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric name closing prices are stored under.
pub const CLOSING_PRICE: &str = "Closing Price (USD)";

/// One daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    /// Trading date
    pub date: NaiveDate,
    /// Closing price
    pub close: f64,
}

/// Month and day a fiscal year ends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYearEnd {
    /// Month (1-12)
    pub month: u32,
    /// Day of month
    pub day: u32,
}

impl Default for FiscalYearEnd {
    fn default() -> Self {
        Self { month: 12, day: 31 }
    }
}

impl FiscalYearEnd {
    /// Year-end date of fiscal year `year`, clamped to the month's last day.
    #[must_use]
    pub fn date_in(&self, year: FiscalYear) -> Option<NaiveDate> {
        (1..=self.day.max(1))
            .rev()
            .find_map(|day| NaiveDate::from_ymd_opt(year, self.month, day))
    }

    /// Fiscal year a trading date belongs to.
    #[must_use]
    pub fn fiscal_year_of(&self, date: NaiveDate) -> Option<FiscalYear> {
        let end = self.date_in(date.year())?;
        Some(if date <= end { date.year() } else { date.year() + 1 })
    }
}

/// Reduce daily closes to one close per fiscal year: the last close on or
/// before that fiscal year's end date.
///
/// Input order does not matter. Non-finite closes are ignored.
#[must_use]
pub fn annual_closes(daily: &[DailyClose], year_end: FiscalYearEnd) -> TimeSeries {
    let mut last: BTreeMap<FiscalYear, DailyClose> = BTreeMap::new();
    for bar in daily.iter().filter(|b| b.close.is_finite()) {
        let Some(year) = year_end.fiscal_year_of(bar.date) else {
            continue;
        };
        match last.get(&year) {
            Some(existing) if existing.date > bar.date => {}
            _ => {
                last.insert(year, *bar);
            }
        }
    }
    last.into_iter().map(|(year, bar)| (year, bar.close)).collect()
}
