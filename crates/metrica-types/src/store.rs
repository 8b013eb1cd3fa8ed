//! Metric store and static assumptions.
//!
//! The [`MetricStore`] is the working memory shared by the resolver and the
//! evaluator: every raw and derived metric lives here under its own name.

use crate::series::{FiscalYear, TimeSeries, is_canonical_year};
use crate::{MetricaError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from metric name to its canonical time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricStore {
    series: BTreeMap<String, TimeSeries>,
}

impl MetricStore {
    /// Create an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            series: BTreeMap::new(),
        }
    }

    /// Store `series` under `name`, returning the previous series if any.
    pub fn insert(&mut self, name: impl Into<String>, series: TimeSeries) -> Option<TimeSeries> {
        self.series.insert(name.into(), series)
    }

    /// Series stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TimeSeries> {
        self.series.get(name)
    }

    /// Mutable access to the series stored under `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut TimeSeries> {
        self.series.get_mut(name)
    }

    /// Single value lookup.
    #[must_use]
    pub fn value(&self, name: &str, year: FiscalYear) -> Option<f64> {
        self.series.get(name).and_then(|s| s.get(year))
    }

    /// Whether a series is stored under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// Remove the series stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<TimeSeries> {
        self.series.remove(name)
    }

    /// Number of metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Metric names in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.series.keys().map(String::as_str)
    }

    /// `(name, series)` pairs in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TimeSeries)> + '_ {
        self.series.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Drop every metric with fewer than `min_years` distinct fiscal years.
    ///
    /// Returns the names that were dropped.
    pub fn retain_min_history(&mut self, min_years: usize) -> Vec<String> {
        let dropped: Vec<String> = self
            .series
            .iter()
            .filter(|(_, s)| s.len() < min_years)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &dropped {
            self.series.remove(name);
            tracing::debug!(metric = %name, min_years, "dropping metric with insufficient history");
        }
        dropped
    }

    /// Verify that every key is a canonical fiscal year.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::ContractViolation`] on the first non-canonical key.
    pub fn verify_canonical(&self) -> Result<()> {
        for (name, series) in &self.series {
            if let Some(year) = series.years().find(|y| !is_canonical_year(i64::from(*y))) {
                return Err(MetricaError::ContractViolation {
                    metric: name.clone(),
                    key: year.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Long-format snapshot with columns `metric`, `fiscal_year`, `value`.
    ///
    /// Rows are ordered by metric name, then ascending year.
    ///
    /// # Errors
    ///
    /// Returns an error if the DataFrame cannot be constructed.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let rows: usize = self.series.values().map(TimeSeries::len).sum();
        let mut metrics = Vec::with_capacity(rows);
        let mut years = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows);

        for (name, series) in &self.series {
            for (year, value) in series.iter() {
                metrics.push(name.clone());
                years.push(year);
                values.push(value);
            }
        }

        let frame = df!(
            "metric" => metrics,
            "fiscal_year" => years,
            "value" => values
        )?;
        Ok(frame)
    }
}

impl FromIterator<(String, TimeSeries)> for MetricStore {
    fn from_iter<I: IntoIterator<Item = (String, TimeSeries)>>(iter: I) -> Self {
        Self {
            series: iter.into_iter().collect(),
        }
    }
}

/// Year-invariant scalar assumptions, such as historical minimum ratios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticAssumptions {
    values: BTreeMap<String, f64>,
}

impl StaticAssumptions {
    /// Create an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Store a finite scalar. Non-finite values remove the entry instead.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        if value.is_finite() {
            self.values.insert(name, value);
        } else {
            self.values.remove(&name);
        }
    }

    /// Scalar stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Whether `name` has a scalar.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Remove the scalar stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.values.remove(name)
    }

    /// Number of scalars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(name, value)` pairs in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> MetricStore {
        let mut store = MetricStore::new();
        store.insert("Total Revenue", (2019..=2023).map(|y| (y, 100.0)).collect());
        store.insert("Goodwill", TimeSeries::from([(2022, 5.0), (2023, 6.0)]));
        store
    }

    #[test]
    fn test_retain_min_history() {
        let mut store = sample();
        let dropped = store.retain_min_history(5);
        assert_eq!(dropped, vec!["Goodwill".to_string()]);
        assert!(store.contains("Total Revenue"));
        assert!(!store.contains("Goodwill"));
    }

    #[test]
    fn test_verify_canonical() {
        let mut store = sample();
        assert!(store.verify_canonical().is_ok());

        store.insert("Broken", TimeSeries::from([(20_230, 1.0)]));
        let err = store.verify_canonical().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_to_frame_long_format() {
        let frame = sample().to_frame().unwrap();
        assert_eq!(frame.height(), 7);
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.column("fiscal_year").unwrap().dtype(), &DataType::Int32);
        assert_eq!(frame.column("value").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_static_assumptions_ignore_non_finite() {
        let mut statics = StaticAssumptions::new();
        statics.insert("Min Cash", 0.12);
        assert_relative_eq!(statics.get("Min Cash").unwrap(), 0.12);
        statics.insert("Min Cash", f64::NAN);
        assert!(statics.is_empty());
    }
}
