//! Rule evaluation over a metric store.

use crate::ops::{self, CagrGap, Operand};
use crate::rule::{Component, EquationRule, Operation};
use crate::table::EquationTable;
use derive_more::Display;
use metrica_types::{MetricStore, Result, StaticAssumptions, TimeSeries};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why a rule produced nothing on a run.
#[derive(Debug, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OmissionReason {
    /// Referenced metrics absent from the store
    #[display("missing inputs: {}", _0.join(", "))]
    MissingInputs(Vec<String>),
    /// Inputs exist but share no fiscal year with a defined result
    #[display("no overlapping fiscal years")]
    NoOverlap,
    /// No year has its prior year present
    #[display("no consecutive fiscal years")]
    NoConsecutiveYears,
    /// Growth rate preconditions unmet
    #[display("growth undefined: {_0}")]
    Cagr(#[serde(with = "cagr_gap_label")] CagrGap),
    /// No lookback year has a usable ratio
    #[display("no valid ratio in lookback window")]
    NoValidRatio,
}

mod cagr_gap_label {
    use super::CagrGap;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        gap: &CagrGap,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(gap)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<CagrGap, D::Error> {
        let label = String::deserialize(deserializer)?;
        [
            CagrGap::TooFewYears,
            CagrGap::MissingBase,
            CagrGap::NonPositiveBase,
            CagrGap::NegativeRatio,
        ]
        .into_iter()
        .find(|gap| gap.to_string() == label)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown growth gap '{label}'")))
    }
}

/// A rule that produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Omission {
    /// Rule name
    pub metric: String,
    /// Why
    pub reason: OmissionReason,
}

/// What one evaluation pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Series written to the store, in evaluation order
    pub computed: Vec<String>,
    /// Scalars written to the static assumptions
    pub statics: Vec<String>,
    /// Rules that produced nothing
    pub omitted: Vec<Omission>,
}

impl EvaluationReport {
    /// Whether `metric` was omitted on this run.
    #[must_use]
    pub fn is_omitted(&self, metric: &str) -> bool {
        self.omitted.iter().any(|o| o.metric == metric)
    }
}

enum Outcome {
    Series(TimeSeries),
    Scalar(f64),
    Omitted(OmissionReason),
}

/// Evaluates an [`EquationTable`] against a company's metrics.
///
/// Holds only a shared, read-only table, so one evaluator can serve many
/// companies across threads.
#[derive(Debug, Clone)]
pub struct Evaluator {
    table: Arc<EquationTable>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Arc::new(EquationTable::with_defaults()))
    }
}

impl Evaluator {
    /// Create an evaluator over `table`.
    #[must_use]
    pub const fn new(table: Arc<EquationTable>) -> Self {
        Self { table }
    }

    /// The rule table.
    #[must_use]
    pub fn table(&self) -> &EquationTable {
        &self.table
    }

    /// Run every rule in order, writing results back into `store` and
    /// `statics` so later rules see earlier results.
    ///
    /// Each rule's output replaces whatever was stored under its name. A rule
    /// that produces nothing removes any stale entry, so repeated runs over
    /// the same raw inputs give identical results.
    ///
    /// # Errors
    ///
    /// Returns [`metrica_types::MetricaError::ContractViolation`] if the store
    /// carries a non-canonical year key. Missing data never errors.
    pub fn evaluate(
        &self,
        store: &mut MetricStore,
        statics: &mut StaticAssumptions,
    ) -> Result<EvaluationReport> {
        store.verify_canonical()?;

        let mut report = EvaluationReport::default();
        for rule in self.table.iter() {
            let name = rule.name();
            match evaluate_rule(rule, store, statics) {
                Outcome::Series(series) => {
                    let scale = rule.scale();
                    let scaled: TimeSeries = series.iter().map(|(y, v)| (y, v * scale)).collect();
                    if scaled.is_empty() {
                        omit(&mut report, store, statics, name, OmissionReason::NoOverlap);
                        continue;
                    }
                    statics.remove(name);
                    store.insert(name, scaled);
                    report.computed.push(name.to_string());
                }
                Outcome::Scalar(value) => {
                    let scaled = value * rule.scale();
                    if !scaled.is_finite() {
                        omit(&mut report, store, statics, name, OmissionReason::NoValidRatio);
                        continue;
                    }
                    store.remove(name);
                    statics.insert(name, scaled);
                    report.statics.push(name.to_string());
                }
                Outcome::Omitted(reason) => omit(&mut report, store, statics, name, reason),
            }
        }

        tracing::debug!(
            computed = report.computed.len(),
            statics = report.statics.len(),
            omitted = report.omitted.len(),
            "evaluated equation table"
        );
        Ok(report)
    }
}

fn omit(
    report: &mut EvaluationReport,
    store: &mut MetricStore,
    statics: &mut StaticAssumptions,
    name: &str,
    reason: OmissionReason,
) {
    tracing::debug!(metric = name, %reason, "omitting derived metric");
    store.remove(name);
    statics.remove(name);
    report.omitted.push(Omission {
        metric: name.to_string(),
        reason,
    });
}

fn operand<'a>(
    name: &str,
    store: &'a MetricStore,
    statics: &StaticAssumptions,
) -> Option<Operand<'a>> {
    store
        .get(name)
        .map(Operand::Series)
        .or_else(|| statics.get(name).map(Operand::Constant))
}

fn evaluate_rule(rule: &EquationRule, store: &MetricStore, statics: &StaticAssumptions) -> Outcome {
    let mut missing = Vec::new();
    let operands: Vec<Option<Operand<'_>>> = rule
        .components()
        .iter()
        .map(|component| match component {
            Component::Literal(value) => Some(Operand::Constant(*value)),
            Component::Metric(name) => {
                let found = operand(name, store, statics);
                if found.is_none() && !missing.contains(name) {
                    missing.push(name.clone());
                }
                found
            }
        })
        .collect();

    let series: Vec<Option<&TimeSeries>> = operands
        .iter()
        .map(|o| match o {
            Some(Operand::Series(s)) => Some(*s),
            _ => None,
        })
        .collect();
    let missing_inputs = || OmissionReason::MissingInputs(missing.clone());

    match rule.operation() {
        op if op.is_arithmetic() => {
            if !missing.is_empty() {
                return Outcome::Omitted(missing_inputs());
            }
            let present: Vec<Operand<'_>> = operands.into_iter().flatten().collect();
            Outcome::Series(ops::arithmetic(op, &present))
        }
        Operation::Cagr => match series.first().copied().flatten() {
            None => Outcome::Omitted(missing_inputs()),
            Some(source) => match ops::cagr(source, rule.lookback().unwrap_or_default()) {
                Ok((year, rate)) => Outcome::Series(TimeSeries::from([(year, rate)])),
                Err(gap) => Outcome::Omitted(OmissionReason::Cagr(gap)),
            },
        },
        Operation::AveragePrior => match series.first().copied().flatten() {
            None => Outcome::Omitted(missing_inputs()),
            Some(source) => {
                let averaged = ops::average_prior(source);
                if averaged.is_empty() {
                    Outcome::Omitted(OmissionReason::NoConsecutiveYears)
                } else {
                    Outcome::Series(averaged)
                }
            }
        },
        Operation::ConsolidateFill => {
            let sources: Vec<&TimeSeries> = series.iter().copied().flatten().collect();
            let filled = ops::consolidate_fill(&sources);
            if filled.is_empty() && !missing.is_empty() {
                Outcome::Omitted(missing_inputs())
            } else {
                Outcome::Series(filled)
            }
        }
        Operation::MinRatioNYears => {
            let numerator = series.first().copied().flatten();
            let denominator = series.get(1).copied().flatten();
            match (numerator, denominator) {
                (Some(numerator), Some(denominator)) => {
                    let lookback = rule.lookback().unwrap_or_default();
                    match ops::min_ratio(numerator, denominator, lookback) {
                        Some(ratio) => Outcome::Scalar(ratio),
                        None => Outcome::Omitted(OmissionReason::NoValidRatio),
                    }
                }
                _ => Outcome::Omitted(missing_inputs()),
            }
        }
        _ => Outcome::Omitted(OmissionReason::NoOverlap),
    }
}
