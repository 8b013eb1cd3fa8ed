//! Stock split detection from share counts and prices.
//!
//! Disclosed share counts are not restated after a split, so a split shows up
//! as a jump between consecutive fiscal years. A jump is only treated as a
//! split when it lands near a common split ratio and the year-end price moved
//! by roughly the inverse amount.

use metrica_types::{FiscalYear, TimeSeries};
use serde::{Deserialize, Serialize};

/// Common forward split ratios.
pub const FORWARD_SPLIT_RATIOS: [f64; 8] = [2.0, 3.0, 4.0, 5.0, 10.0, 20.0, 50.0, 100.0];

/// Common reverse split ratios.
pub const REVERSE_SPLIT_RATIOS: [f64; 6] = [
    1.0 / 2.0,
    1.0 / 3.0,
    1.0 / 4.0,
    1.0 / 5.0,
    1.0 / 10.0,
    1.0 / 100.0,
];

/// Configuration for split detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Minimum share-count ratio (or its reciprocal for reverse splits)
    /// considered at all
    pub min_jump: f64,
    /// Absolute tolerance when matching a ratio to a known split ratio
    pub ratio_tolerance: f64,
    /// Absolute tolerance between the implied price ratio and the split factor
    pub price_tolerance: f64,
    /// Forward split ratios to match against
    pub forward_ratios: Vec<f64>,
    /// Reverse split ratios to match against
    pub reverse_ratios: Vec<f64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            min_jump: 1.5,
            ratio_tolerance: 0.05,
            price_tolerance: 0.6,
            forward_ratios: FORWARD_SPLIT_RATIOS.to_vec(),
            reverse_ratios: REVERSE_SPLIT_RATIOS.to_vec(),
        }
    }
}

/// A confirmed split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitEvent {
    /// First fiscal year reported on the post-split basis
    pub year: FiscalYear,
    /// New shares per old share (below 1 for a reverse split)
    pub factor: f64,
}

impl SplitEvent {
    /// Whether this is a reverse split.
    #[must_use]
    pub const fn is_reverse(&self) -> bool {
        self.factor < 1.0
    }
}

/// The known ratio closest to `ratio`, if one lies within `tolerance`.
#[must_use]
pub fn match_split_ratio(ratio: f64, known: &[f64], tolerance: f64) -> Option<f64> {
    known
        .iter()
        .copied()
        .filter(|k| (ratio - k).abs() <= tolerance)
        .min_by(|a, b| (ratio - a).abs().total_cmp(&(ratio - b).abs()))
}

/// Detects splits between consecutive fiscal years.
#[derive(Debug, Clone, Default)]
pub struct SplitDetector {
    config: SplitConfig,
}

impl SplitDetector {
    /// Create a detector with `config`.
    #[must_use]
    pub const fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    /// Detector configuration.
    #[must_use]
    pub const fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Confirmed splits, oldest first.
    ///
    /// Pairs are consecutive entries of `shares`. A pair without a positive
    /// share count on both sides, or without a positive price on both sides,
    /// is skipped.
    #[must_use]
    pub fn detect(&self, shares: &TimeSeries, prices: &TimeSeries) -> Vec<SplitEvent> {
        let points: Vec<(FiscalYear, f64)> = shares.iter().collect();
        points
            .windows(2)
            .filter_map(|pair| {
                let [(prev_year, prev_shares), (year, cur_shares)] = [pair[0], pair[1]];
                self.confirm(prev_year, prev_shares, year, cur_shares, prices)
            })
            .collect()
    }

    fn candidate_factor(&self, ratio: f64) -> Option<f64> {
        let config = &self.config;
        if ratio >= config.min_jump {
            match_split_ratio(ratio, &config.forward_ratios, config.ratio_tolerance)
        } else if ratio <= 1.0 / config.min_jump {
            match_split_ratio(ratio, &config.reverse_ratios, config.ratio_tolerance)
        } else {
            None
        }
    }

    fn confirm(
        &self,
        prev_year: FiscalYear,
        prev_shares: f64,
        year: FiscalYear,
        cur_shares: f64,
        prices: &TimeSeries,
    ) -> Option<SplitEvent> {
        if prev_shares <= 0.0 || cur_shares <= 0.0 {
            return None;
        }
        let ratio = cur_shares / prev_shares;
        let factor = self.candidate_factor(ratio)?;

        let (Some(prev_price), Some(cur_price)) = (
            prices.get(prev_year).filter(|p| *p > 0.0),
            prices.get(year).filter(|p| *p > 0.0),
        ) else {
            tracing::debug!(
                year,
                ratio,
                factor,
                "share jump without prices on both sides; not adjusting"
            );
            return None;
        };

        // Reverse splits are compared in reciprocal space.
        let (implied, expected) = if factor >= 1.0 {
            (prev_price / cur_price, factor)
        } else {
            (cur_price / prev_price, factor.recip())
        };
        if (implied - expected).abs() > self.config.price_tolerance {
            tracing::debug!(
                year,
                ratio,
                factor,
                implied_price_ratio = implied,
                "rejected split candidate: price did not move with share count"
            );
            return None;
        }

        tracing::info!(year, factor, "confirmed stock split");
        Some(SplitEvent { year, factor })
    }
}
