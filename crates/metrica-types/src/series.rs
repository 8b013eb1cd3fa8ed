//! Canonical fiscal-year time series.
//!
//! A [`TimeSeries`] maps an integer fiscal year to a finite value. A year that
//! is not present is "absent"; there is no separate null marker. Insertion
//! order is irrelevant and iteration is always ascending by year.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Integer fiscal year key.
pub type FiscalYear = i32;

/// Earliest fiscal year accepted as canonical.
pub const MIN_FISCAL_YEAR: FiscalYear = 1900;

/// Latest fiscal year accepted as canonical.
pub const MAX_FISCAL_YEAR: FiscalYear = 2200;

/// Returns `true` if `year` lies in the canonical fiscal-year range.
#[must_use]
pub const fn is_canonical_year(year: i64) -> bool {
    year >= MIN_FISCAL_YEAR as i64 && year <= MAX_FISCAL_YEAR as i64
}

/// A year-keyed series of finite values for one metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSeries {
    points: BTreeMap<FiscalYear, f64>,
}

impl TimeSeries {
    /// Create an empty series.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            points: BTreeMap::new(),
        }
    }

    /// Insert a value for `year`.
    ///
    /// Non-finite values are treated as absent: they are not stored and any
    /// existing entry for the year is removed. Returns whether a value was stored.
    pub fn insert(&mut self, year: FiscalYear, value: f64) -> bool {
        if value.is_finite() {
            self.points.insert(year, value);
            true
        } else {
            self.points.remove(&year);
            false
        }
    }

    /// Value at `year`, if present.
    #[must_use]
    pub fn get(&self, year: FiscalYear) -> Option<f64> {
        self.points.get(&year).copied()
    }

    /// Whether `year` has a value.
    #[must_use]
    pub fn contains(&self, year: FiscalYear) -> bool {
        self.points.contains_key(&year)
    }

    /// Remove and return the value at `year`.
    pub fn remove(&mut self, year: FiscalYear) -> Option<f64> {
        self.points.remove(&year)
    }

    /// Number of years with a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Earliest year present.
    #[must_use]
    pub fn first_year(&self) -> Option<FiscalYear> {
        self.points.keys().next().copied()
    }

    /// Latest year present.
    #[must_use]
    pub fn latest_year(&self) -> Option<FiscalYear> {
        self.points.keys().next_back().copied()
    }

    /// Years present, ascending.
    pub fn years(&self) -> impl DoubleEndedIterator<Item = FiscalYear> + '_ {
        self.points.keys().copied()
    }

    /// `(year, value)` pairs, ascending by year.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (FiscalYear, f64)> + '_ {
        self.points.iter().map(|(y, v)| (*y, *v))
    }

    /// Apply `f` to every value strictly before `year`.
    ///
    /// Results that are not finite remove the entry.
    pub fn update_before(&mut self, year: FiscalYear, f: impl Fn(f64) -> f64) {
        let earlier: Vec<FiscalYear> = self.points.range(..year).map(|(y, _)| *y).collect();
        for y in earlier {
            if let Some(v) = self.points.get(&y).copied() {
                self.insert(y, f(v));
            }
        }
    }

    /// Keep only the `window` most recent years relative to the latest year.
    ///
    /// With a latest year of 2023 and a window of 3, years 2021..=2023 survive.
    pub fn retain_recent(&mut self, window: usize) {
        let Some(latest) = self.latest_year() else {
            return;
        };
        let span = i32::try_from(window).unwrap_or(i32::MAX);
        let cutoff = latest.saturating_sub(span).saturating_add(1);
        self.points.retain(|y, _| *y >= cutoff);
    }

    /// Drop every year after `year`.
    pub fn retain_through(&mut self, year: FiscalYear) {
        self.points.retain(|y, _| *y <= year);
    }

    /// Borrow the underlying ordered map.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<FiscalYear, f64> {
        &self.points
    }
}

impl FromIterator<(FiscalYear, f64)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (FiscalYear, f64)>>(iter: I) -> Self {
        let mut series = Self::new();
        for (year, value) in iter {
            series.insert(year, value);
        }
        series
    }
}

impl<const N: usize> From<[(FiscalYear, f64); N]> for TimeSeries {
    fn from(pairs: [(FiscalYear, f64); N]) -> Self {
        pairs.into_iter().collect()
    }
}
