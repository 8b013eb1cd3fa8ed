//! Pure operations over year-keyed series.
//!
//! None of these functions fail: missing inputs, division by zero and
//! undefined growth all collapse to absent years.

use crate::rule::Operation;
use derive_more::Display;
use metrica_types::{FiscalYear, TimeSeries};

/// An input to an arithmetic operation.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    /// A year-keyed series
    Series(&'a TimeSeries),
    /// A constant present in every year
    Constant(f64),
}

impl Operand<'_> {
    /// Value at `year`.
    #[must_use]
    pub fn at(&self, year: FiscalYear) -> Option<f64> {
        match self {
            Self::Series(series) => series.get(year),
            Self::Constant(value) => Some(*value),
        }
    }
}

fn apply(operation: Operation, lhs: f64, rhs: f64) -> Option<f64> {
    match operation {
        Operation::Add => Some(lhs + rhs),
        Operation::Subtract => Some(lhs - rhs),
        Operation::Multiply => Some(lhs * rhs),
        Operation::Divide if rhs == 0.0 => None,
        Operation::Divide => Some(lhs / rhs),
        _ => None,
    }
}

/// Fold `operands` left to right with `operation` for every year present in
/// all series operands.
///
/// Constants never restrict the year set. With no series operand at all the
/// result is empty. Years where a division by zero occurs, or where the
/// result is not finite, are absent.
#[must_use]
pub fn arithmetic(operation: Operation, operands: &[Operand<'_>]) -> TimeSeries {
    let series: Vec<&TimeSeries> = operands
        .iter()
        .filter_map(|o| match o {
            Operand::Series(s) => Some(*s),
            Operand::Constant(_) => None,
        })
        .collect();
    let Some((first, rest)) = series.split_first() else {
        return TimeSeries::new();
    };

    first
        .years()
        .filter(|year| rest.iter().all(|s| s.contains(*year)))
        .filter_map(|year| {
            let values: Vec<f64> = operands.iter().map(|o| o.at(year)).collect::<Option<_>>()?;
            let (head, tail) = values.split_first()?;
            let value = tail
                .iter()
                .try_fold(*head, |acc, v| apply(operation, acc, *v))?;
            value.is_finite().then_some((year, value))
        })
        .collect()
}

/// Why a growth rate could not be computed.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum CagrGap {
    /// Fewer than `years + 1` distinct years
    #[display("too few years of history")]
    TooFewYears,
    /// No value at the base year
    #[display("no value at the base year")]
    MissingBase,
    /// Base value is zero or negative
    #[display("base value is not positive")]
    NonPositiveBase,
    /// End and base values have opposite signs
    #[display("end and base values have opposite signs")]
    NegativeRatio,
}

/// Compound annual growth rate over `years`, anchored at the latest year.
///
/// Returns the anchor year and the growth rate as a fraction. The base year is
/// exactly `years` before the anchor.
///
/// # Errors
///
/// Returns a [`CagrGap`] when the series is too short, lacks the base year,
/// has a non-positive base, or changes sign between base and anchor.
pub fn cagr(series: &TimeSeries, years: usize) -> Result<(FiscalYear, f64), CagrGap> {
    if years == 0 || series.len() < years.saturating_add(1) {
        return Err(CagrGap::TooFewYears);
    }
    let span = i32::try_from(years).map_err(|_| CagrGap::TooFewYears)?;
    let (end_year, end) = series.iter().next_back().ok_or(CagrGap::TooFewYears)?;
    let base_year = end_year.checked_sub(span).ok_or(CagrGap::MissingBase)?;
    let base = series.get(base_year).ok_or(CagrGap::MissingBase)?;
    if base <= 0.0 {
        return Err(CagrGap::NonPositiveBase);
    }

    let ratio = end / base;
    if ratio < 0.0 {
        return Err(CagrGap::NegativeRatio);
    }
    Ok((end_year, ratio.powf(1.0 / f64::from(span)) - 1.0))
}

/// Mean of each year's value and the prior year's value.
///
/// Only years whose immediate predecessor is present produce a result.
#[must_use]
pub fn average_prior(series: &TimeSeries) -> TimeSeries {
    series
        .iter()
        .filter_map(|(year, value)| {
            let prior = series.get(year.checked_sub(1)?)?;
            Some((year, (value + prior) / 2.0))
        })
        .collect()
}

/// Year by year, the value of the first source that has one.
#[must_use]
pub fn consolidate_fill(sources: &[&TimeSeries]) -> TimeSeries {
    let mut filled = TimeSeries::new();
    for source in sources {
        for (year, value) in source.iter() {
            if !filled.contains(year) {
                filled.insert(year, value);
            }
        }
    }
    filled
}

/// Minimum of `numerator / denominator` over the `years` most recent years
/// where both are present and the denominator is non-zero.
#[must_use]
pub fn min_ratio(numerator: &TimeSeries, denominator: &TimeSeries, years: usize) -> Option<f64> {
    numerator
        .iter()
        .rev()
        .filter_map(|(year, num)| {
            let den = denominator.get(year).filter(|d| *d != 0.0)?;
            Some(num / den).filter(|r| r.is_finite())
        })
        .take(years)
        .reduce(f64::min)
}
