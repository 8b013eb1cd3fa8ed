#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/metrica/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Equation rules and metric derivation for metrica.
//!
//! This crate provides:
//! - Rule definitions with a fixed set of operations (arithmetic, CAGR,
//!   prior-year averaging, consolidation fill, minimum ratio)
//! - Equation tables ordered by their rule-to-rule dependencies
//! - An evaluator that writes derived series and static assumptions back
//!   into a [`metrica_types::MetricStore`]
//! - The built-in valuation rule registry

/// The version of the metrica-eval crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod evaluator;
pub mod ops;
pub mod registry;
pub mod rule;
pub mod table;

pub use evaluator::{EvaluationReport, Evaluator, Omission, OmissionReason};
pub use ops::{CagrGap, Operand};
pub use registry::{
    RuleCategory, available_categories, available_rules, get_rule_info, rules_by_category,
};
pub use rule::{
    Component, DEFAULT_CAGR_YEARS, DEFAULT_MIN_RATIO_YEARS, EquationRule, Operation,
    RuleDefinition,
};
pub use table::{EquationTable, OrderingPolicy, SkippedRule};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }
}
