//! SEC XBRL `companyfacts` documents.
//!
//! The document groups facts by taxonomy, then tag, then unit:
//! `facts.us-gaap.<Tag>.units.<Unit>[{ start, end, val, fy, fp, form, filed }]`.
//! Only the `us-gaap` taxonomy feeds resolution.
//!
//! Duration facts carry a `start`; instant facts (balance sheet positions,
//! share counts) do not. Annual filings also report quarter-length durations
//! that end on the fiscal year end, so only durations spanning about a year
//! become observations.

use crate::observation::{FormType, RawObservation};
use chrono::{Datelike, NaiveDate};
use metrica_types::{FiscalYear, Result, is_canonical_year};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Taxonomy used for resolution.
pub const US_GAAP: &str = "us-gaap";

/// Length in days a duration fact must span to count as a fiscal year.
///
/// Wide enough for 52/53-week fiscal years.
pub const ANNUAL_SPAN_DAYS: RangeInclusive<i64> = 330..=400;

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// A decoded `companyfacts` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyFactsDocument {
    /// CIK number
    #[serde(default)]
    pub cik: Option<u64>,
    /// Entity name
    #[serde(rename = "entityName", default)]
    pub entity_name: Option<String>,
    /// Facts organized by taxonomy and tag
    #[serde(default)]
    pub facts: BTreeMap<String, BTreeMap<String, TagFacts>>,
}

/// Facts for a specific XBRL tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagFacts {
    /// Label
    #[serde(default)]
    pub label: Option<String>,
    /// Units (USD, shares, ...) containing the fact values
    #[serde(default)]
    pub units: BTreeMap<String, Vec<FactValue>>,
}

/// A single reported fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactValue {
    /// Start date of a duration period (`YYYY-MM-DD`); absent for instants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// End date of the period (`YYYY-MM-DD`)
    #[serde(default)]
    pub end: Option<String>,
    /// Reported value
    pub val: f64,
    /// Fiscal year of the filing
    #[serde(default)]
    pub fy: Option<i64>,
    /// Fiscal period (`FY`, `Q1`, ...)
    #[serde(default)]
    pub fp: Option<String>,
    /// Form type
    #[serde(default)]
    pub form: Option<String>,
    /// Filed date
    #[serde(default)]
    pub filed: Option<String>,
}

impl FactValue {
    /// Fiscal year this fact is filed under.
    ///
    /// The year of the `end` date wins; the filing's `fy` is the fallback.
    #[must_use]
    pub fn fiscal_year(&self) -> Option<FiscalYear> {
        let from_end = self
            .end
            .as_deref()
            .and_then(parse_date)
            .map(|date| i64::from(date.year()));
        from_end
            .or(self.fy)
            .filter(|y| is_canonical_year(*y))
            .and_then(|y| FiscalYear::try_from(y).ok())
    }

    /// Days between `start` and `end`, for duration facts with both dates.
    #[must_use]
    pub fn span_days(&self) -> Option<i64> {
        let start = parse_date(self.start.as_deref()?)?;
        let end = parse_date(self.end.as_deref()?)?;
        Some((end - start).num_days())
    }

    /// Whether this fact covers a whole fiscal year.
    ///
    /// Instants qualify. A duration qualifies when its span is within
    /// [`ANNUAL_SPAN_DAYS`]; one with an unreadable date does not.
    #[must_use]
    pub fn is_annual_span(&self) -> bool {
        if self.start.is_none() {
            return true;
        }
        self.span_days()
            .is_some_and(|days| ANNUAL_SPAN_DAYS.contains(&days))
    }
}

impl CompanyFactsDocument {
    /// Decode a document from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`metrica_types::MetricaError::Json`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Flatten the `us-gaap` facts into observations.
    ///
    /// Facts without a usable fiscal year, with a non-finite value, or with a
    /// duration shorter or longer than a fiscal year are skipped.
    /// Observations keep document order within each tag and unit.
    #[must_use]
    pub fn observations(&self) -> Vec<RawObservation> {
        let Some(gaap) = self.facts.get(US_GAAP) else {
            return Vec::new();
        };

        let mut observations = Vec::new();
        for (tag, tag_facts) in gaap {
            for (unit, values) in &tag_facts.units {
                for fact in values {
                    let Some(year) = fact.fiscal_year() else {
                        continue;
                    };
                    if !fact.val.is_finite() || !fact.is_annual_span() {
                        continue;
                    }
                    let form = fact
                        .form
                        .as_deref()
                        .map_or(FormType::Other, FormType::from_code);
                    observations.push(RawObservation::new(
                        tag.clone(),
                        year,
                        fact.val,
                        form,
                        unit.clone(),
                    ));
                }
            }
        }
        observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::UnitFamily;

    const SAMPLE: &str = r#"{
        "cik": 320193,
        "entityName": "Apple Inc.",
        "facts": {
            "dei": {
                "EntityCommonStockSharesOutstanding": {
                    "units": { "shares": [ { "end": "2023-10-20", "val": 15550061000, "form": "10-K" } ] }
                }
            },
            "us-gaap": {
                "Revenues": {
                    "label": "Revenues",
                    "units": {
                        "USD": [
                            { "end": "2022-09-24", "val": 394328000000, "fy": 2022, "fp": "FY", "form": "10-K" },
                            { "end": "2023-07-01", "val": 81797000000, "fy": 2023, "fp": "Q3", "form": "10-Q" },
                            { "val": 1.0, "form": "10-K" }
                        ]
                    }
                },
                "CommonStockSharesOutstanding": {
                    "units": { "shares": [ { "end": "bad-date", "val": 15943425000, "fy": 2022, "form": "10-K" } ] }
                }
            }
        }
    }"#;

    #[test]
    fn test_observations_from_document() {
        let doc = CompanyFactsDocument::from_json(SAMPLE).unwrap();
        assert_eq!(doc.entity_name.as_deref(), Some("Apple Inc."));

        let observations = doc.observations();
        assert_eq!(observations.len(), 3);
        assert!(observations.iter().all(|o| o.tag != "EntityCommonStockSharesOutstanding"));

        let annual: Vec<_> = observations.iter().filter(|o| o.form.is_annual()).collect();
        assert_eq!(annual.len(), 2);
    }

    #[test]
    fn test_fiscal_year_falls_back_to_fy() {
        let doc = CompanyFactsDocument::from_json(SAMPLE).unwrap();
        let shares = doc
            .observations()
            .into_iter()
            .find(|o| o.tag == "CommonStockSharesOutstanding")
            .unwrap();
        assert_eq!(shares.fiscal_year, 2022);
        assert_eq!(shares.unit_family(), Some(UnitFamily::Shares));
    }

    #[test]
    fn test_quarter_sharing_year_end_does_not_replace_annual() {
        use crate::resolver::AnnualFacts;

        let doc = CompanyFactsDocument::from_json(
            r#"{ "facts": { "us-gaap": { "Revenues": { "units": { "USD": [
                { "start": "2023-01-01", "end": "2023-12-31", "val": 400, "fp": "FY", "form": "10-K" },
                { "start": "2023-10-01", "end": "2023-12-31", "val": 100, "fp": "FY", "form": "10-K" }
            ] } } } } }"#,
        )
        .unwrap();

        let observations = doc.observations();
        assert_eq!(observations.len(), 1);

        let annual = AnnualFacts::new(&observations);
        let revenue = annual.get("Revenues", UnitFamily::Monetary).unwrap();
        assert_eq!(revenue.get(2023), Some(400.0));
    }

    #[test]
    fn test_annual_span() {
        let fact = |start: Option<&str>, end: &str| FactValue {
            start: start.map(str::to_string),
            end: Some(end.to_string()),
            val: 1.0,
            fy: None,
            fp: None,
            form: None,
            filed: None,
        };
        assert!(fact(None, "2023-12-31").is_annual_span());
        assert!(fact(Some("2022-09-25"), "2023-09-30").is_annual_span());
        assert!(fact(Some("2022-01-01"), "2022-12-31").is_annual_span());
        assert!(!fact(Some("2023-07-02"), "2023-09-30").is_annual_span());
        assert!(!fact(Some("2021-01-01"), "2022-12-31").is_annual_span());
        assert!(!fact(Some("garbage"), "2023-12-31").is_annual_span());
        assert_eq!(fact(Some("2023-10-01"), "2023-12-31").span_days(), Some(91));
    }

    #[test]
    fn test_missing_taxonomy_is_empty() {
        let doc = CompanyFactsDocument::from_json(r#"{ "facts": {} }"#).unwrap();
        assert!(doc.observations().is_empty());
    }
}
