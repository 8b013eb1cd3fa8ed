//! Normalization boundary.
//!
//! Converts raw per-metric payloads, either parallel `{years, values}` arrays
//! or already year-keyed maps, into a canonical [`MetricStore`]. Keys that
//! cannot be coerced to a fiscal year are noise and are dropped. A key that
//! survives coercion but is not canonical means the coercion itself is broken,
//! and is reported as a [`MetricaError::ContractViolation`].
//!
//! [`MetricaError::ContractViolation`]: crate::MetricaError::ContractViolation

use crate::series::{FiscalYear, TimeSeries, is_canonical_year};
use crate::{MetricStore, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A year key as it arrives from a scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YearKey {
    /// Integer key
    Int(i64),
    /// Floating point key, accepted only when integral
    Float(f64),
    /// Text key such as `"2021"`, `"FY"` or `"TTM"`
    Label(String),
}

impl YearKey {
    /// Coerce to a canonical fiscal year, or `None` if the key is noise.
    #[must_use]
    pub fn to_fiscal_year(&self) -> Option<FiscalYear> {
        let year = match self {
            Self::Int(y) => *y,
            Self::Float(f) => {
                if !f.is_finite() || f.fract() != 0.0 {
                    return None;
                }
                *f as i64
            }
            Self::Label(s) => parse_year_label(s)?,
        };
        if is_canonical_year(year) {
            FiscalYear::try_from(year).ok()
        } else {
            None
        }
    }
}

impl From<i64> for YearKey {
    fn from(year: i64) -> Self {
        Self::Int(year)
    }
}

impl From<&str> for YearKey {
    fn from(label: &str) -> Self {
        Self::Label(label.to_string())
    }
}

fn parse_year_label(label: &str) -> Option<i64> {
    let trimmed = label.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// A reported value as it arrives from a scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Numeric value
    Number(f64),
    /// Numeric text, parsed after trimming
    Text(String),
}

impl RawValue {
    /// Finite numeric value, if any.
    #[must_use]
    pub fn to_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(v) => *v,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Raw per-metric data handed to the normalization boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPayload {
    /// Parallel year and value sequences, as produced by resolution.
    Parallel {
        /// Year keys
        years: Vec<YearKey>,
        /// Values aligned with `years`; `null` is absent
        values: Vec<Option<RawValue>>,
    },
    /// Already year-keyed mapping for metrics that skip resolution.
    Keyed(BTreeMap<String, Option<RawValue>>),
}

impl RawPayload {
    /// Build a parallel payload from aligned numeric data.
    #[must_use]
    pub fn parallel(years: &[FiscalYear], values: &[f64]) -> Self {
        Self::Parallel {
            years: years.iter().map(|y| YearKey::Int(i64::from(*y))).collect(),
            values: values.iter().map(|v| Some(RawValue::Number(*v))).collect(),
        }
    }

    /// Coerce into a canonical series.
    ///
    /// Returns `None` when the payload is structurally unusable (parallel
    /// sequences of unequal length). Later duplicates of a year replace earlier
    /// ones; a later absent value clears the year.
    #[must_use]
    pub fn to_series(&self) -> Option<TimeSeries> {
        let mut series = TimeSeries::new();
        let mut put = |key: Option<FiscalYear>, value: Option<f64>| {
            if let Some(year) = key {
                match value {
                    Some(v) => {
                        series.insert(year, v);
                    }
                    None => {
                        series.remove(year);
                    }
                }
            }
        };

        match self {
            Self::Parallel { years, values } => {
                if years.len() != values.len() {
                    return None;
                }
                for (key, value) in years.iter().zip(values) {
                    put(
                        key.to_fiscal_year(),
                        value.as_ref().and_then(RawValue::to_f64),
                    );
                }
            }
            Self::Keyed(map) => {
                for (key, value) in map {
                    let year = parse_year_label(key)
                        .filter(|y| is_canonical_year(*y))
                        .and_then(|y| FiscalYear::try_from(y).ok());
                    put(year, value.as_ref().and_then(RawValue::to_f64));
                }
            }
        }
        Some(series)
    }
}

/// Options for the normalization boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Drop fiscal years after this one.
    pub as_of: Option<FiscalYear>,
    /// Keep only this many most recent fiscal years per metric, counted back
    /// from the latest year that survives `as_of`.
    pub window: Option<usize>,
}

/// Normalize raw payloads into a canonical [`MetricStore`].
///
/// Metrics whose payload is unusable or yields no years are omitted.
///
/// # Errors
///
/// Returns [`MetricaError::ContractViolation`] if a non-canonical key survives
/// coercion.
///
/// [`MetricaError::ContractViolation`]: crate::MetricaError::ContractViolation
pub fn normalize<'a, I, K>(raw: I, config: &NormalizeConfig) -> Result<MetricStore>
where
    I: IntoIterator<Item = (K, &'a RawPayload)>,
    K: AsRef<str>,
{
    let mut store = MetricStore::new();

    for (name, payload) in raw {
        let name = name.as_ref();
        let Some(mut series) = payload.to_series() else {
            tracing::warn!(metric = name, "dropping payload with mismatched years and values");
            continue;
        };
        if let Some(as_of) = config.as_of {
            series.retain_through(as_of);
        }
        if let Some(window) = config.window {
            series.retain_recent(window);
        }
        if series.is_empty() {
            tracing::debug!(metric = name, "no usable fiscal years after normalization");
            continue;
        }
        store.insert(name, series);
    }

    store.verify_canonical()?;
    Ok(store)
}
