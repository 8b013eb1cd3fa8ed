//! Candidate specs and the per-metric candidate table.
//!
//! A metric is bound to an ordered list of candidates, most preferred first.
//! A candidate is either a single taxonomy tag or a composite of two or more
//! tags combined left to right with `+` and `-`.
//!
//! In configuration a candidate is written as a string (`"GrossProfit"`,
//! `"Revenues - CostOfRevenue"`) or as the legacy token list that begins with
//! the `"CALCULATION:"` marker.

use crate::observation::UnitFamily;
use derive_more::Display;
use indexmap::IndexMap;
use metrica_types::{MetricaError, Result, TimeSeries};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marker token that opens a legacy composite token list.
pub const CALCULATION_MARKER: &str = "CALCULATION:";

/// Sign applied to one term of a composite candidate.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    /// Add the term
    #[display("+")]
    Plus,
    /// Subtract the term
    #[display("-")]
    Minus,
}

impl Sign {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "+" => Some(Self::Plus),
            "-" => Some(Self::Minus),
            _ => None,
        }
    }

    const fn apply(self, acc: f64, value: f64) -> f64 {
        match self {
            Self::Plus => acc + value,
            Self::Minus => acc - value,
        }
    }
}

/// One way of obtaining a metric from raw tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CandidateRepr", into = "String")]
pub enum CandidateSpec {
    /// A single tag lookup.
    Tag(String),
    /// Two or more tags combined left to right. The first term is always `+`.
    Composite(Vec<(Sign, String)>),
}

impl CandidateSpec {
    /// Single-tag candidate.
    #[must_use]
    pub fn tag(name: impl Into<String>) -> Self {
        Self::Tag(name.into())
    }

    /// `a - b`
    #[must_use]
    pub fn difference(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self::Composite(vec![(Sign::Plus, a.into()), (Sign::Minus, b.into())])
    }

    /// `a + b + ...`
    #[must_use]
    pub fn sum(tags: &[&str]) -> Self {
        Self::Composite(tags.iter().map(|t| (Sign::Plus, (*t).to_string())).collect())
    }

    /// Whether this candidate combines several tags.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    /// Tags referenced by this candidate, in order.
    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        let (single, terms) = match self {
            Self::Tag(name) => (Some(name.as_str()), &[][..]),
            Self::Composite(terms) => (None, terms.as_slice()),
        };
        single
            .into_iter()
            .chain(terms.iter().map(|(_, t)| t.as_str()))
    }

    /// Evaluate the candidate against per-tag annual series.
    ///
    /// A composite produces a value only for years where every tag has a value;
    /// if any tag is missing entirely the result is empty.
    pub fn evaluate<'a, F>(&self, lookup: F) -> TimeSeries
    where
        F: Fn(&str) -> Option<&'a TimeSeries>,
    {
        match self {
            Self::Tag(name) => lookup(name).cloned().unwrap_or_default(),
            Self::Composite(terms) => {
                let mut series = Vec::with_capacity(terms.len());
                for (sign, tag) in terms {
                    match lookup(tag) {
                        Some(s) if !s.is_empty() => series.push((*sign, s)),
                        _ => return TimeSeries::new(),
                    }
                }
                let Some((_, first)) = series.first() else {
                    return TimeSeries::new();
                };
                first
                    .years()
                    .filter_map(|year| {
                        series
                            .iter()
                            .try_fold(0.0, |acc, (sign, s)| s.get(year).map(|v| sign.apply(acc, v)))
                            .map(|value| (year, value))
                    })
                    .collect()
            }
        }
    }

    /// Parse the legacy `["CALCULATION:", ...]` token list.
    ///
    /// Two forms are accepted: the postfix pair `[marker, A, B, op]` and the
    /// infix chain `[marker, A, op, B, op, C, ...]`. A list without the marker
    /// is accepted when it holds exactly one tag.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::InvalidCandidate`] for malformed lists.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        let tokens: Vec<&str> = tokens.iter().map(|t| t.as_ref().trim()).collect();
        let rendered = format!("{tokens:?}");
        let invalid = |reason: &str| MetricaError::InvalidCandidate {
            spec: rendered.clone(),
            reason: reason.to_string(),
        };

        let body = match tokens.split_first() {
            Some((&first, rest)) if first == CALCULATION_MARKER => rest,
            Some(_) if tokens.len() == 1 => return Self::from_str(tokens[0]),
            Some(_) => return Err(invalid("token list must start with CALCULATION:")),
            None => return Err(invalid("empty token list")),
        };

        // Postfix pair: [A, B, op]
        if let [a, b, op] = body
            && Sign::from_token(a).is_none()
            && Sign::from_token(b).is_none()
            && let Some(sign) = Sign::from_token(op)
        {
            return Self::build(vec![(Sign::Plus, *a), (sign, *b)]).map_err(|r| invalid(&r));
        }

        let mut terms = Vec::new();
        let mut pending = Some(Sign::Plus);
        for token in body {
            match (Sign::from_token(token), pending) {
                (Some(_), Some(_)) => return Err(invalid("operator where a tag was expected")),
                (Some(sign), None) => pending = Some(sign),
                (None, Some(sign)) => {
                    terms.push((sign, *token));
                    pending = None;
                }
                (None, None) => return Err(invalid("two tags without an operator")),
            }
        }
        if pending.is_some() {
            return Err(invalid("dangling operator"));
        }
        if terms.len() < 2 {
            return Err(invalid("a composite needs at least two tags"));
        }
        Self::build(terms).map_err(|r| invalid(&r))
    }

    fn build(terms: Vec<(Sign, &str)>) -> std::result::Result<Self, String> {
        if terms.iter().any(|(_, t)| t.is_empty()) {
            return Err("empty tag name".to_string());
        }
        if let Some((_, t)) = terms.iter().find(|(_, t)| t.contains(['*', '/'])) {
            return Err(format!("only + and - are supported in composites, found '{t}'"));
        }
        match terms.len() {
            0 => Err("no tags".to_string()),
            1 => match terms[0] {
                (Sign::Plus, tag) => Ok(Self::Tag(tag.to_string())),
                (Sign::Minus, _) => Err("a single tag cannot be negated".to_string()),
            },
            _ => Ok(Self::Composite(
                terms
                    .into_iter()
                    .map(|(s, t)| (s, t.to_string()))
                    .collect(),
            )),
        }
    }
}

impl FromStr for CandidateSpec {
    type Err = MetricaError;

    /// Parse `"Tag"` or an infix composite such as `"A - B + C"`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| MetricaError::InvalidCandidate {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        let mut terms: Vec<(Sign, &str)> = Vec::new();
        let mut pending = Some(Sign::Plus);
        let mut rest = s;
        loop {
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                break;
            }
            let op = trimmed.chars().next().and_then(|c| match c {
                '+' => Some(Some(Sign::Plus)),
                '-' => Some(Some(Sign::Minus)),
                '*' | '/' => Some(None),
                _ => None,
            });
            match op {
                Some(None) => return Err(invalid("only + and - are supported in composites")),
                Some(Some(sign)) => {
                    if pending.is_some() {
                        return Err(invalid("operator where a tag was expected"));
                    }
                    pending = Some(sign);
                    rest = &trimmed[1..];
                }
                None => {
                    let end = trimmed
                        .find(|c: char| c.is_whitespace() || matches!(c, '+' | '-' | '*' | '/'))
                        .unwrap_or(trimmed.len());
                    let Some(sign) = pending.take() else {
                        return Err(invalid("two tags without an operator"));
                    };
                    terms.push((sign, &trimmed[..end]));
                    rest = &trimmed[end..];
                }
            }
        }
        if terms.is_empty() {
            return Err(invalid("empty candidate"));
        }
        if pending.is_some() {
            return Err(invalid("dangling operator"));
        }
        Self::build(terms).map_err(|r| invalid(&r))
    }
}

impl fmt::Display for CandidateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(name) => f.write_str(name),
            Self::Composite(terms) => {
                for (i, (sign, tag)) in terms.iter().enumerate() {
                    if i == 0 {
                        f.write_str(tag)?;
                    } else {
                        write!(f, " {sign} {tag}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl From<CandidateSpec> for String {
    fn from(spec: CandidateSpec) -> Self {
        spec.to_string()
    }
}

/// Configuration shape of a candidate: a string or a legacy token list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateRepr {
    /// `"Tag"` or `"A - B"`
    Text(String),
    /// `["CALCULATION:", ...]`
    Tokens(Vec<String>),
}

impl TryFrom<CandidateRepr> for CandidateSpec {
    type Error = MetricaError;

    fn try_from(repr: CandidateRepr) -> Result<Self> {
        match repr {
            CandidateRepr::Text(text) => text.parse(),
            CandidateRepr::Tokens(tokens) => Self::from_tokens(&tokens),
        }
    }
}

/// Candidates bound to one metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricBinding {
    /// Unit family accepted for this metric
    #[serde(default)]
    pub unit: UnitFamily,
    /// Ordered candidates, most preferred first
    pub candidates: Vec<CandidateSpec>,
}

impl MetricBinding {
    /// Monetary binding.
    #[must_use]
    pub const fn monetary(candidates: Vec<CandidateSpec>) -> Self {
        Self {
            unit: UnitFamily::Monetary,
            candidates,
        }
    }

    /// Binding in the given unit family.
    #[must_use]
    pub const fn with_unit(unit: UnitFamily, candidates: Vec<CandidateSpec>) -> Self {
        Self { unit, candidates }
    }
}

#[derive(Debug, Deserialize)]
struct BindingRepr {
    #[serde(default)]
    unit: UnitFamily,
    candidates: Vec<CandidateRepr>,
}

/// Ordered mapping from metric name to its candidate binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateTable {
    bindings: IndexMap<String, MetricBinding>,
}

impl CandidateTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::Json`] for malformed JSON and
    /// [`MetricaError::InvalidCandidate`] for the first unparseable candidate.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: IndexMap<String, BindingRepr> = serde_json::from_str(json)?;
        let mut table = Self::new();
        for (metric, binding) in raw {
            let candidates = binding
                .candidates
                .into_iter()
                .map(CandidateSpec::try_from)
                .collect::<Result<Vec<_>>>()?;
            table.insert(metric, MetricBinding::with_unit(binding.unit, candidates));
        }
        Ok(table)
    }

    /// Serialize the table to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Bind `metric` to `binding`, replacing any previous binding.
    pub fn insert(&mut self, metric: impl Into<String>, binding: MetricBinding) {
        self.bindings.insert(metric.into(), binding);
    }

    /// Binding for `metric`.
    #[must_use]
    pub fn get(&self, metric: &str) -> Option<&MetricBinding> {
        self.bindings.get(metric)
    }

    /// Whether `metric` is bound.
    #[must_use]
    pub fn contains(&self, metric: &str) -> bool {
        self.bindings.contains_key(metric)
    }

    /// `(metric, binding)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricBinding)> + '_ {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bound metric names in declaration order.
    pub fn metrics(&self) -> impl Iterator<Item = &str> + '_ {
        self.bindings.keys().map(String::as_str)
    }

    /// Number of bound metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::collections::HashMap;

    #[rstest]
    #[case("GrossProfit", "GrossProfit")]
    #[case("Revenues - CostOfRevenue", "Revenues - CostOfRevenue")]
    #[case("Revenues-CostOfRevenue", "Revenues - CostOfRevenue")]
    #[case("  A +B - C ", "A + B - C")]
    fn test_parse_text(#[case] input: &str, #[case] rendered: &str) {
        let spec: CandidateSpec = input.parse().unwrap();
        assert_eq!(spec.to_string(), rendered);
    }

    #[rstest]
    #[case("")]
    #[case("A -")]
    #[case("- A")]
    #[case("A B")]
    #[case("A * B")]
    #[case("A / B")]
    fn test_parse_text_rejects(#[case] input: &str) {
        let err = input.parse::<CandidateSpec>().unwrap_err();
        assert!(matches!(err, MetricaError::InvalidCandidate { .. }));
    }

    #[test]
    fn test_legacy_postfix_pair() {
        let spec = CandidateSpec::from_tokens(&["CALCULATION:", "Revenues", "CostOfRevenue", "-"])
            .unwrap();
        assert_eq!(spec, CandidateSpec::difference("Revenues", "CostOfRevenue"));
    }

    #[test]
    fn test_legacy_infix_chain() {
        let spec = CandidateSpec::from_tokens(&[
            "CALCULATION:",
            "Depreciation",
            "+",
            "AmortizationOfIntangibleAssets",
            "+",
            "Depletion",
        ])
        .unwrap();
        assert_eq!(
            spec,
            CandidateSpec::sum(&["Depreciation", "AmortizationOfIntangibleAssets", "Depletion"])
        );
    }

    #[rstest]
    #[case(&["CALCULATION:"][..])]
    #[case(&["CALCULATION:", "A"][..])]
    #[case(&["CALCULATION:", "A", "+"][..])]
    #[case(&["CALCULATION:", "A", "B", "*"][..])]
    #[case(&["A", "B"][..])]
    fn test_legacy_rejects(#[case] tokens: &[&str]) {
        assert!(CandidateSpec::from_tokens(tokens).is_err());
    }

    #[test]
    fn test_serde_accepts_both_shapes() {
        let specs: Vec<CandidateSpec> = serde_json::from_str(
            r#"["Revenues", "Revenues - CostOfRevenue", ["CALCULATION:", "A", "B", "+"]]"#,
        )
        .unwrap();
        assert_eq!(specs[0], CandidateSpec::tag("Revenues"));
        assert!(specs[1].is_composite());
        assert_eq!(specs[2], CandidateSpec::sum(&["A", "B"]));

        let json = serde_json::to_string(&specs[1]).unwrap();
        assert_eq!(json, r#""Revenues - CostOfRevenue""#);
    }

    #[test]
    fn test_composite_requires_every_component() {
        let mut facts: HashMap<&str, TimeSeries> = HashMap::new();
        facts.insert("X", TimeSeries::from([(2020, 10.0), (2021, 12.0)]));
        facts.insert("Y", TimeSeries::from([(2020, 4.0)]));
        let spec = CandidateSpec::difference("X", "Y");

        let result = spec.evaluate(|tag| facts.get(tag));
        assert_eq!(result.len(), 1);
        assert_relative_eq!(result.get(2020).unwrap(), 6.0);
        assert!(result.get(2021).is_none());

        let missing = CandidateSpec::difference("X", "Z").evaluate(|tag| facts.get(tag));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_table_from_json() {
        let table = CandidateTable::from_json(
            r#"{
                "Gross Profit": { "candidates": ["GrossProfit", "Revenues - CostOfRevenue"] },
                "Total Common Shares Outstanding": { "unit": "shares", "candidates": ["CommonStockSharesOutstanding"] }
            }"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.metrics().next(), Some("Gross Profit"));
        assert_eq!(
            table.get("Total Common Shares Outstanding").unwrap().unit,
            UnitFamily::Shares
        );
    }

    #[test]
    fn test_table_reports_invalid_candidate() {
        let err = CandidateTable::from_json(r#"{ "X": { "candidates": ["A * B"] } }"#).unwrap_err();
        assert!(matches!(err, MetricaError::InvalidCandidate { .. }));
    }
}
