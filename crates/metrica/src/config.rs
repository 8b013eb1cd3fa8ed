//! Engine configuration.

use chrono::Datelike;
use metrica_eval::OrderingPolicy;
use metrica_resolve::{DEFAULT_TARGET_YEARS, RecentWindow};
use metrica_splits::SplitConfig;
use metrica_types::{FiscalYear, MetricaError, NormalizeConfig, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Default minimum number of fiscal years a metric needs to take part in
/// derivation.
pub const DEFAULT_MIN_HISTORY_YEARS: usize = 5;

/// Configuration for [`crate::Engine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Metrics with fewer distinct fiscal years are dropped before evaluation
    pub min_history_years: usize,
    /// Number of recent years a candidate must cover to be a full match
    pub target_years: usize,
    /// Most recent fiscal year considered; defaults to the last completed
    /// calendar year
    pub as_of_year: Option<FiscalYear>,
    /// Keep only this many most recent fiscal years per metric
    pub history_window: Option<usize>,
    /// Split detection thresholds
    pub split: SplitConfig,
    /// Evaluation order policy for equation tables loaded from JSON
    pub ordering: OrderingPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_history_years: DEFAULT_MIN_HISTORY_YEARS,
            target_years: DEFAULT_TARGET_YEARS,
            as_of_year: None,
            history_window: None,
            split: SplitConfig::default(),
            ordering: OrderingPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads a `.env` file if present, then:
    ///
    /// - `METRICA_MIN_HISTORY_YEARS` (default 5)
    /// - `METRICA_TARGET_YEARS` (default 4)
    /// - `METRICA_AS_OF_YEAR` (default: last completed calendar year)
    /// - `METRICA_HISTORY_WINDOW` (default: unbounded)
    /// - `METRICA_SPLIT_PRICE_TOLERANCE` (default 0.6)
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::InvalidData`] if a variable is set but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self> {
        // Try to load .env file (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a configuration from a variable lookup, starting from defaults.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::InvalidData`] if a variable is set but cannot be
    /// parsed.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(years) = parse_var(&lookup, "METRICA_MIN_HISTORY_YEARS")? {
            config.min_history_years = years;
        }
        if let Some(years) = parse_var(&lookup, "METRICA_TARGET_YEARS")? {
            config.target_years = years;
        }
        config.as_of_year = parse_var(&lookup, "METRICA_AS_OF_YEAR")?;
        config.history_window = parse_var(&lookup, "METRICA_HISTORY_WINDOW")?;
        if let Some(tolerance) = parse_var::<f64>(&lookup, "METRICA_SPLIT_PRICE_TOLERANCE")? {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(MetricaError::InvalidData(format!(
                    "METRICA_SPLIT_PRICE_TOLERANCE must be a non-negative number, got {tolerance}"
                )));
            }
            config.split.price_tolerance = tolerance;
        }

        Ok(config)
    }

    /// The effective as-of year.
    #[must_use]
    pub fn as_of_year(&self) -> FiscalYear {
        self.as_of_year
            .unwrap_or_else(|| chrono::Local::now().date_naive().year() - 1)
    }

    /// The recent window candidates are measured against.
    #[must_use]
    pub fn window(&self) -> RecentWindow {
        RecentWindow::new(self.as_of_year(), self.target_years)
    }

    /// Options for the normalization boundary.
    ///
    /// Resolved series are cut at the as-of year, the same cutoff applied to
    /// closing prices.
    #[must_use]
    pub fn normalize(&self) -> NormalizeConfig {
        NormalizeConfig {
            as_of: Some(self.as_of_year()),
            window: self.history_window,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| MetricaError::InvalidData(format!("{key}={raw}: {e}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.min_history_years, 5);
        assert_eq!(config.target_years, 4);
        assert_eq!(config.split.price_tolerance, 0.6);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_vars(vars(&[
            ("METRICA_MIN_HISTORY_YEARS", "3"),
            ("METRICA_TARGET_YEARS", " 5 "),
            ("METRICA_AS_OF_YEAR", "2023"),
            ("METRICA_HISTORY_WINDOW", "10"),
            ("METRICA_SPLIT_PRICE_TOLERANCE", "0.4"),
        ]))
        .unwrap();
        assert_eq!(config.min_history_years, 3);
        assert_eq!(config.target_years, 5);
        assert_eq!(config.as_of_year(), 2023);
        assert_eq!(config.window(), RecentWindow::new(2023, 5));
        assert_eq!(config.normalize().window, Some(10));
        assert_eq!(config.split.price_tolerance, 0.4);
    }

    #[rstest]
    #[case("METRICA_AS_OF_YEAR", "last year")]
    #[case("METRICA_MIN_HISTORY_YEARS", "-3")]
    #[case("METRICA_HISTORY_WINDOW", "5.5")]
    #[case("METRICA_SPLIT_PRICE_TOLERANCE", "-1")]
    #[case("METRICA_SPLIT_PRICE_TOLERANCE", "NaN")]
    fn test_invalid_values_are_errors(#[case] key: &str, #[case] value: &str) {
        let err = EngineConfig::from_vars(vars(&[(key, value)])).unwrap_err();
        assert!(matches!(err, MetricaError::InvalidData(_)));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = EngineConfig::from_vars(vars(&[("METRICA_TARGET_YEARS", "")])).unwrap();
        assert_eq!(config.target_years, 4);
    }
}
