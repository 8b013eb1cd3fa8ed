//! Tag fallback resolution.
//!
//! For every bound metric the resolver evaluates each candidate against a
//! company's annual observations and picks one:
//!
//! 1. the first candidate, in declaration order, that covers every year of the
//!    recent window ([`Selection::Full`]);
//! 2. otherwise the candidate with the most recent-window years, ties going to
//!    the earlier declaration ([`Selection::BestEffort`]). Candidates with no
//!    years at all never take part;
//! 3. otherwise, if the metric has exactly one candidate, that candidate with
//!    an empty series ([`Selection::OnlyCandidate`]).
//!
//! Every resolution carries its [`Coverage`] so callers can tell full data
//! from degraded data without re-deriving it.

use crate::candidate::{CandidateSpec, CandidateTable, MetricBinding};
use crate::observation::{RawObservation, UnitFamily};
use chrono::{Datelike, NaiveDate};
use derive_more::Display;
use indexmap::IndexMap;
use metrica_types::{FiscalYear, RawPayload, TimeSeries};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Default number of recent fiscal years a candidate should cover.
pub const DEFAULT_TARGET_YEARS: usize = 4;

/// The recent fiscal years a candidate is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentWindow {
    /// Most recent fiscal year of the window
    pub as_of_year: FiscalYear,
    /// Number of years in the window
    pub target_years: usize,
}

impl RecentWindow {
    /// Window ending at `as_of_year`.
    #[must_use]
    pub const fn new(as_of_year: FiscalYear, target_years: usize) -> Self {
        Self {
            as_of_year,
            target_years,
        }
    }

    /// Window ending at the last completed calendar year before `today`.
    #[must_use]
    pub fn last_completed(today: NaiveDate, target_years: usize) -> Self {
        Self::new(today.year() - 1, target_years)
    }

    /// Years in the window, most recent first.
    pub fn years(&self) -> impl Iterator<Item = FiscalYear> + '_ {
        (0..self.target_years).map_while(move |offset| {
            i32::try_from(offset)
                .ok()
                .map(|offset| self.as_of_year - offset)
        })
    }

    /// Measure how much of the window `series` covers.
    #[must_use]
    pub fn coverage(&self, series: &TimeSeries) -> Coverage {
        let found = self.years().filter(|y| series.contains(*y)).count();
        Coverage {
            requested: self.target_years,
            found,
            total_years: series.len(),
            full: self.target_years > 0 && found == self.target_years,
        }
    }
}

impl Default for RecentWindow {
    fn default() -> Self {
        Self::last_completed(chrono::Local::now().date_naive(), DEFAULT_TARGET_YEARS)
    }
}

/// Years found versus years requested for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// Number of recent years requested
    pub requested: usize,
    /// Number of recent years present
    pub found: usize,
    /// Number of years present overall
    pub total_years: usize,
    /// Whether every requested year is present
    pub full: bool,
}

impl Coverage {
    /// Fraction of requested years found.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.requested == 0 {
            0.0
        } else {
            self.found as f64 / self.requested as f64
        }
    }
}

/// How a candidate was chosen.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selection {
    /// Covered the whole recent window
    #[display("full")]
    Full,
    /// Best partial coverage
    #[display("best-effort")]
    BestEffort,
    /// Only candidate, kept despite yielding no years
    #[display("only-candidate")]
    OnlyCandidate,
}

/// Result of evaluating one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateOutcome {
    /// The candidate
    pub candidate: CandidateSpec,
    /// Values it produced
    pub series: TimeSeries,
    /// Its coverage of the recent window
    pub coverage: Coverage,
}

/// The chosen representation of one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Metric name
    pub metric: String,
    /// Chosen candidate
    pub candidate: CandidateSpec,
    /// Values of the chosen candidate
    pub series: TimeSeries,
    /// Coverage of the chosen candidate
    pub coverage: Coverage,
    /// How the candidate was chosen
    pub selection: Selection,
}

impl Resolution {
    /// Raw `{years, values}` payload, most recent year first.
    #[must_use]
    pub fn to_payload(&self) -> RawPayload {
        let (years, values): (Vec<FiscalYear>, Vec<f64>) = self.series.iter().rev().unzip();
        RawPayload::parallel(&years, &values)
    }
}

/// All resolutions for one company.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyResolution {
    /// Ticker, when known
    pub ticker: Option<String>,
    /// Resolved metrics in table order
    pub resolutions: IndexMap<String, Resolution>,
    /// Metrics no candidate could supply
    pub unresolved: Vec<String>,
}

impl CompanyResolution {
    /// Payloads for the normalization boundary.
    #[must_use]
    pub fn payloads(&self) -> IndexMap<String, RawPayload> {
        self.resolutions
            .iter()
            .map(|(metric, r)| (metric.clone(), r.to_payload()))
            .collect()
    }

    /// Coverage per resolved metric.
    #[must_use]
    pub fn coverage(&self) -> IndexMap<String, Coverage> {
        self.resolutions
            .iter()
            .map(|(metric, r)| (metric.clone(), r.coverage))
            .collect()
    }

    /// Resolution for `metric`.
    #[must_use]
    pub fn get(&self, metric: &str) -> Option<&Resolution> {
        self.resolutions.get(metric)
    }
}

/// Annual observations indexed by tag and unit family.
///
/// Only annual-form observations in a known unit are kept. When a tag and
/// year are reported more than once, the last observation wins.
#[derive(Debug, Clone, Default)]
pub struct AnnualFacts {
    series: HashMap<(String, UnitFamily), TimeSeries>,
}

impl AnnualFacts {
    /// Index `observations`.
    #[must_use]
    pub fn new(observations: &[RawObservation]) -> Self {
        let mut series: HashMap<(String, UnitFamily), TimeSeries> = HashMap::new();
        let mut rejected = 0usize;
        for obs in observations.iter().filter(|o| o.form.is_annual()) {
            let Some(family) = obs.unit_family() else {
                rejected += 1;
                continue;
            };
            series
                .entry((obs.tag.clone(), family))
                .or_default()
                .insert(obs.fiscal_year, obs.value);
        }
        if rejected > 0 {
            tracing::debug!(rejected, "ignored annual observations with unknown units");
        }
        Self { series }
    }

    /// Annual series of `tag` in `family`.
    #[must_use]
    pub fn get(&self, tag: &str, family: UnitFamily) -> Option<&TimeSeries> {
        self.series.get(&(tag.to_string(), family))
    }

    /// Number of indexed tag/unit series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether nothing was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Configuration for [`Resolver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Recent window candidates are measured against
    pub window: RecentWindow,
}

/// Selects the best candidate for every bound metric.
#[derive(Debug, Clone)]
pub struct Resolver {
    table: Arc<CandidateTable>,
    config: ResolverConfig,
}

impl Resolver {
    /// Create a resolver over a shared candidate table.
    #[must_use]
    pub const fn new(table: Arc<CandidateTable>, config: ResolverConfig) -> Self {
        Self { table, config }
    }

    /// The candidate table.
    #[must_use]
    pub fn table(&self) -> &CandidateTable {
        &self.table
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Evaluate every candidate of `binding`, in declaration order.
    #[must_use]
    pub fn evaluate_candidates(
        &self,
        binding: &MetricBinding,
        facts: &AnnualFacts,
    ) -> Vec<CandidateOutcome> {
        binding
            .candidates
            .iter()
            .map(|candidate| {
                let series = candidate.evaluate(|tag| facts.get(tag, binding.unit));
                let coverage = self.config.window.coverage(&series);
                CandidateOutcome {
                    candidate: candidate.clone(),
                    series,
                    coverage,
                }
            })
            .collect()
    }

    /// Resolve one metric, or `None` if no candidate qualifies.
    #[must_use]
    pub fn resolve_metric(
        &self,
        metric: &str,
        binding: &MetricBinding,
        facts: &AnnualFacts,
    ) -> Option<Resolution> {
        let outcomes = self.evaluate_candidates(binding, facts);
        let only_one = outcomes.len() == 1;

        let first_full = outcomes.iter().position(|o| o.coverage.full);
        let (chosen, selection) = if let Some(full) = first_full {
            (full, Selection::Full)
        } else if let Some(best) = best_effort(&outcomes) {
            tracing::debug!(
                metric,
                found = outcomes[best].coverage.found,
                requested = outcomes[best].coverage.requested,
                candidate = %outcomes[best].candidate,
                "falling back to best-effort coverage"
            );
            (best, Selection::BestEffort)
        } else if only_one {
            (0, Selection::OnlyCandidate)
        } else {
            return None;
        };

        let outcome = outcomes.into_iter().nth(chosen)?;
        Some(Resolution {
            metric: metric.to_string(),
            candidate: outcome.candidate,
            series: outcome.series,
            coverage: outcome.coverage,
            selection,
        })
    }

    /// Resolve every bound metric from one company's observations.
    #[must_use]
    pub fn resolve(&self, observations: &[RawObservation]) -> CompanyResolution {
        let facts = AnnualFacts::new(observations);
        let mut company = CompanyResolution::default();

        for (metric, binding) in self.table.iter() {
            match self.resolve_metric(metric, binding, &facts) {
                Some(resolution) => {
                    company.resolutions.insert(metric.to_string(), resolution);
                }
                None => {
                    tracing::debug!(metric, "no candidate supplied any data");
                    company.unresolved.push(metric.to_string());
                }
            }
        }
        company
    }
}

/// Index of the candidate with the most recent-window years. Ties keep the
/// earliest candidate; candidates with no years at all are ignored.
fn best_effort(outcomes: &[CandidateOutcome]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (index, outcome) in outcomes.iter().enumerate() {
        if outcome.coverage.total_years == 0 {
            continue;
        }
        match best {
            Some((_, found)) if outcome.coverage.found <= found => {}
            _ => best = Some((index, outcome.coverage.found)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::FormType;
    use approx::assert_relative_eq;

    fn resolver(table: CandidateTable) -> Resolver {
        let config = ResolverConfig {
            window: RecentWindow::new(2023, 4),
        };
        Resolver::new(Arc::new(table), config)
    }

    fn usd(tag: &str, years: impl IntoIterator<Item = FiscalYear>) -> Vec<RawObservation> {
        years
            .into_iter()
            .map(|y| RawObservation::annual_usd(tag, y, f64::from(y)))
            .collect()
    }

    fn single(metric: &str, binding: MetricBinding) -> CandidateTable {
        let mut table = CandidateTable::new();
        table.insert(metric, binding);
        table
    }

    #[test]
    fn test_window_years() {
        let window = RecentWindow::new(2023, 4);
        assert_eq!(window.years().collect::<Vec<_>>(), vec![2023, 2022, 2021, 2020]);
        let window = RecentWindow::last_completed(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), 2);
        assert_eq!(window.years().collect::<Vec<_>>(), vec![2024, 2023]);
    }

    #[test]
    fn test_full_coverage_beats_declaration_order() {
        let table = single(
            "Total Revenue",
            MetricBinding::monetary(vec![CandidateSpec::tag("A"), CandidateSpec::tag("B")]),
        );
        let mut observations = usd("A", 2021..=2023);
        observations.extend(usd("B", 2019..=2023));

        let company = resolver(table).resolve(&observations);
        let resolution = company.get("Total Revenue").unwrap();
        assert_eq!(resolution.candidate, CandidateSpec::tag("B"));
        assert_eq!(resolution.selection, Selection::Full);
        assert!(resolution.coverage.full);
        assert_eq!(resolution.coverage.total_years, 5);
    }

    #[test]
    fn test_first_full_candidate_wins() {
        let table = single(
            "Net Income",
            MetricBinding::monetary(vec![CandidateSpec::tag("A"), CandidateSpec::tag("B")]),
        );
        let mut observations = usd("A", 2020..=2023);
        observations.extend(usd("B", 2015..=2023));
        let company = resolver(table).resolve(&observations);
        assert_eq!(company.get("Net Income").unwrap().candidate, CandidateSpec::tag("A"));
    }

    #[test]
    fn test_best_effort_ties_keep_declaration_order() {
        let table = single(
            "Goodwill",
            MetricBinding::monetary(vec![
                CandidateSpec::tag("Empty"),
                CandidateSpec::tag("A"),
                CandidateSpec::tag("B"),
            ]),
        );
        let mut observations = usd("A", [2022, 2023]);
        observations.extend(usd("B", [2021, 2023]));

        let resolution = resolver(table).resolve(&observations).resolutions["Goodwill"].clone();
        assert_eq!(resolution.candidate, CandidateSpec::tag("A"));
        assert_eq!(resolution.selection, Selection::BestEffort);
        assert_eq!(resolution.coverage.found, 2);
        assert_relative_eq!(resolution.coverage.fraction(), 0.5);
    }

    #[test]
    fn test_zero_year_candidates_are_discarded() {
        let table = single(
            "Goodwill",
            MetricBinding::monetary(vec![CandidateSpec::tag("X"), CandidateSpec::tag("Y")]),
        );
        let company = resolver(table).resolve(&[]);
        assert!(company.resolutions.is_empty());
        assert_eq!(company.unresolved, vec!["Goodwill".to_string()]);
    }

    #[test]
    fn test_only_candidate_is_kept_empty() {
        let table = single("Goodwill", MetricBinding::monetary(vec![CandidateSpec::tag("X")]));
        let company = resolver(table).resolve(&[]);
        let resolution = company.get("Goodwill").unwrap();
        assert_eq!(resolution.selection, Selection::OnlyCandidate);
        assert!(resolution.series.is_empty());
    }

    #[test]
    fn test_composite_completeness() {
        let table = single(
            "Free Cash",
            MetricBinding::monetary(vec![CandidateSpec::difference("X", "Y")]),
        );
        let observations = vec![
            RawObservation::annual_usd("X", 2021, 100.0),
            RawObservation::annual_usd("X", 2022, 110.0),
            RawObservation::annual_usd("Y", 2022, 10.0),
        ];
        let resolution = resolver(table).resolve(&observations).resolutions["Free Cash"].clone();
        assert!(resolution.series.get(2021).is_none());
        assert_relative_eq!(resolution.series.get(2022).unwrap(), 100.0);
    }

    #[test]
    fn test_units_and_forms_are_filtered() {
        let table = single(
            "Total Common Shares Outstanding",
            MetricBinding::with_unit(UnitFamily::Shares, vec![CandidateSpec::tag("Shares")]),
        );
        let observations = vec![
            RawObservation::new("Shares", 2022, 5.0, FormType::Annual, "USD"),
            RawObservation::new("Shares", 2022, 7.0, FormType::Annual, "shares"),
            RawObservation::new("Shares", 2023, 9.0, FormType::Quarterly, "shares"),
            RawObservation::new("Shares", 2023, 1.0, FormType::Annual, "EUR"),
        ];
        let resolution = resolver(table).resolve(&observations).resolutions
            ["Total Common Shares Outstanding"]
            .clone();
        assert_eq!(resolution.series.len(), 1);
        assert_relative_eq!(resolution.series.get(2022).unwrap(), 7.0);
    }

    #[test]
    fn test_duplicate_year_keeps_last() {
        let facts = AnnualFacts::new(&[
            RawObservation::annual_usd("Revenues", 2022, 1.0),
            RawObservation::annual_usd("Revenues", 2022, 2.0),
        ]);
        let series = facts.get("Revenues", UnitFamily::Monetary).unwrap();
        assert_relative_eq!(series.get(2022).unwrap(), 2.0);
    }

    #[test]
    fn test_payload_is_most_recent_first() {
        let table = single("Net Income", MetricBinding::monetary(vec![CandidateSpec::tag("A")]));
        let company = resolver(table).resolve(&usd("A", 2020..=2023));
        match &company.payloads()["Net Income"] {
            RawPayload::Parallel { years, .. } => {
                assert_eq!(years.first().and_then(|y| y.to_fiscal_year()), Some(2023));
            }
            RawPayload::Keyed(_) => panic!("expected parallel payload"),
        }
    }
}
