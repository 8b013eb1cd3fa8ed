//! Restating pre-split history onto the post-split basis.

use crate::detect::{SplitConfig, SplitDetector, SplitEvent};
use metrica_types::MetricStore;
use serde::{Deserialize, Serialize};

/// Metric names the adjuster reads and rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTargets {
    /// Share count used for detection; multiplied by the split factor
    pub shares: String,
    /// Year-end price used for detection; divided by the split factor
    pub price: String,
    /// Other share counts multiplied by the split factor
    pub share_counts: Vec<String>,
    /// Other per-share values divided by the split factor
    pub per_share_values: Vec<String>,
}

impl Default for SplitTargets {
    fn default() -> Self {
        Self {
            shares: "Total Common Shares Outstanding".to_string(),
            price: "Closing Price (USD)".to_string(),
            share_counts: vec!["Preferred Stock Issued".to_string()],
            per_share_values: Vec::new(),
        }
    }
}

/// Detects splits in a company's store and restates earlier years.
#[derive(Debug, Clone, Default)]
pub struct SplitAdjuster {
    detector: SplitDetector,
    targets: SplitTargets,
}

impl SplitAdjuster {
    /// Create an adjuster.
    #[must_use]
    pub const fn new(config: SplitConfig, targets: SplitTargets) -> Self {
        Self {
            detector: SplitDetector::new(config),
            targets,
        }
    }

    /// The detector.
    #[must_use]
    pub const fn detector(&self) -> &SplitDetector {
        &self.detector
    }

    /// The metric names this adjuster touches.
    #[must_use]
    pub const fn targets(&self) -> &SplitTargets {
        &self.targets
    }

    /// Detect splits and restate every year strictly before each split.
    ///
    /// Share counts are multiplied and per-share values divided by the factor
    /// of every later split, so several splits compound. Years at or after a
    /// split are untouched. Without both the share and price series the store
    /// is left as is. Returns the confirmed splits, oldest first.
    pub fn apply(&self, store: &mut MetricStore) -> Vec<SplitEvent> {
        let events = match (store.get(&self.targets.shares), store.get(&self.targets.price)) {
            (Some(shares), Some(prices)) => self.detector.detect(shares, prices),
            _ => {
                tracing::debug!("share count or price series missing; skipping split adjustment");
                return Vec::new();
            }
        };

        let multiplied = std::iter::once(&self.targets.shares).chain(&self.targets.share_counts);
        for name in multiplied {
            if let Some(series) = store.get_mut(name) {
                for event in &events {
                    series.update_before(event.year, |v| v * event.factor);
                }
            }
        }

        let divided = std::iter::once(&self.targets.price).chain(&self.targets.per_share_values);
        for name in divided {
            if let Some(series) = store.get_mut(name) {
                for event in &events {
                    series.update_before(event.year, |v| v / event.factor);
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use metrica_types::TimeSeries;

    fn store(shares: TimeSeries, prices: TimeSeries) -> MetricStore {
        let mut store = MetricStore::new();
        store.insert("Total Common Shares Outstanding", shares);
        store.insert("Closing Price (USD)", prices);
        store
    }

    #[test]
    fn test_two_for_one_split_restates_prior_year() {
        let mut store = store(
            TimeSeries::from([(2021, 50.0), (2022, 100.0)]),
            TimeSeries::from([(2021, 40.0), (2022, 20.0)]),
        );
        let events = SplitAdjuster::default().apply(&mut store);

        assert_eq!(events, vec![SplitEvent { year: 2022, factor: 2.0 }]);
        assert_relative_eq!(store.value("Total Common Shares Outstanding", 2021).unwrap(), 100.0);
        assert_relative_eq!(store.value("Closing Price (USD)", 2021).unwrap(), 20.0);
        assert_relative_eq!(store.value("Total Common Shares Outstanding", 2022).unwrap(), 100.0);
        assert_relative_eq!(store.value("Closing Price (USD)", 2022).unwrap(), 20.0);
    }

    #[test]
    fn test_buyback_noise_leaves_store_unchanged() {
        let mut store = store(
            TimeSeries::from([(2021, 50.0), (2022, 100.0)]),
            TimeSeries::from([(2021, 40.0), (2022, 38.0)]),
        );
        let before = store.clone();
        assert!(SplitAdjuster::default().apply(&mut store).is_empty());
        assert_eq!(store, before);
    }

    #[test]
    fn test_splits_compound_backward() {
        let mut store = store(
            TimeSeries::from([
                (2017, 10.0),
                (2018, 10.0),
                (2019, 40.0),
                (2020, 40.0),
                (2021, 80.0),
            ]),
            TimeSeries::from([
                (2017, 380.0),
                (2018, 400.0),
                (2019, 100.0),
                (2020, 120.0),
                (2021, 60.0),
            ]),
        );
        store.insert(
            "Preferred Stock Issued",
            TimeSeries::from([(2018, 1.0), (2020, 2.0), (2021, 2.0)]),
        );
        store.insert("Total Revenue", TimeSeries::from([(2018, 7.0)]));

        let events = SplitAdjuster::default().apply(&mut store);
        assert_eq!(events.len(), 2);

        let shares = store.get("Total Common Shares Outstanding").unwrap();
        assert_relative_eq!(shares.get(2017).unwrap(), 80.0);
        assert_relative_eq!(shares.get(2018).unwrap(), 80.0);
        assert_relative_eq!(shares.get(2019).unwrap(), 80.0);
        assert_relative_eq!(shares.get(2020).unwrap(), 80.0);
        assert_relative_eq!(shares.get(2021).unwrap(), 80.0);

        let prices = store.get("Closing Price (USD)").unwrap();
        assert_relative_eq!(prices.get(2017).unwrap(), 47.5);
        assert_relative_eq!(prices.get(2019).unwrap(), 50.0);
        assert_relative_eq!(prices.get(2021).unwrap(), 60.0);

        let preferred = store.get("Preferred Stock Issued").unwrap();
        assert_relative_eq!(preferred.get(2018).unwrap(), 8.0);
        assert_relative_eq!(preferred.get(2020).unwrap(), 4.0);
        assert_relative_eq!(preferred.get(2021).unwrap(), 2.0);

        assert_relative_eq!(store.value("Total Revenue", 2018).unwrap(), 7.0);
    }

    #[test]
    fn test_missing_price_series_is_a_no_op() {
        let mut store = MetricStore::new();
        store.insert(
            "Total Common Shares Outstanding",
            TimeSeries::from([(2021, 50.0), (2022, 100.0)]),
        );
        let before = store.clone();
        assert!(SplitAdjuster::default().apply(&mut store).is_empty());
        assert_eq!(store, before);
    }

    #[test]
    fn test_custom_targets() {
        let targets = SplitTargets {
            shares: "Shares".to_string(),
            price: "Price".to_string(),
            share_counts: Vec::new(),
            per_share_values: vec!["Dividend Per Share".to_string()],
        };
        let mut store = MetricStore::new();
        store.insert("Shares", TimeSeries::from([(2022, 10.0), (2023, 30.0)]));
        store.insert("Price", TimeSeries::from([(2022, 90.0), (2023, 30.0)]));
        store.insert("Dividend Per Share", TimeSeries::from([(2022, 3.0)]));

        let adjuster = SplitAdjuster::new(SplitConfig::default(), targets);
        assert_eq!(adjuster.apply(&mut store).len(), 1);
        assert_relative_eq!(store.value("Dividend Per Share", 2022).unwrap(), 1.0);
        assert_relative_eq!(store.value("Shares", 2022).unwrap(), 30.0);
    }
}
