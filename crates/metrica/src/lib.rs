#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/metrica/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # metrica
//!
//! metrica is an umbrella crate that ties the metrica sub-crates into one
//! per-company pipeline:
//!
//! 1. **Resolve** raw XBRL facts into one annual series per financial metric
//! 2. **Normalize** the payloads into a canonical [`MetricStore`]
//! 3. **Adjust** pre-split share counts and prices onto the current basis
//! 4. **Evaluate** the equation table into derived series and static
//!    assumptions
//!
//! ## Crate Organization
//!
//! - [`types`] - Time series, metric stores, normalization and errors
//! - [`resolve`] - Candidate tables, company facts and the resolver
//! - [`eval`] - Equation rules, the default rule registry and the evaluator
//! - [`splits`] - Stock split detection and adjustment

/// Version information for the metrica crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod engine;

pub use config::{DEFAULT_MIN_HISTORY_YEARS, EngineConfig};
pub use engine::{CompanyMetrics, Engine};

// Re-export the types every caller touches
pub use metrica_types::{
    FiscalYear, MetricStore, MetricaError, Result, StaticAssumptions, TimeSeries,
};

// ============================================================================
// Core Types
// ============================================================================

/// Canonical time series, metric stores and the normalization boundary.
///
/// Every fiscal year that leaves this module is a four-digit calendar year;
/// anything else is a [`MetricaError::ContractViolation`].
pub mod types {
    pub use metrica_types::*;
}

// ============================================================================
// Metric Resolution
// ============================================================================

/// Resolving raw XBRL observations into annual metric series.
///
/// A [`CandidateTable`](resolve::CandidateTable) binds each financial metric
/// to an ordered list of XBRL tags or tag combinations. The
/// [`Resolver`](resolve::Resolver) picks the first candidate that fully covers
/// the recent window and falls back to the best partial match.
///
/// # Example
///
/// ```
/// use metrica::resolve::{RawObservation, RecentWindow, Resolver, ResolverConfig, default_candidates};
/// use std::sync::Arc;
///
/// let resolver = Resolver::new(
///     Arc::new(default_candidates()),
///     ResolverConfig { window: RecentWindow::new(2023, 1) },
/// );
/// let resolution = resolver.resolve(&[RawObservation::annual_usd("Revenues", 2023, 10.0)]);
/// assert!(resolution.get("Total Revenue").is_some());
/// ```
pub mod resolve {
    pub use metrica_resolve::*;
}

// ============================================================================
// Equation Evaluation
// ============================================================================

/// Equation rules and their evaluation.
///
/// ## Operations
///
/// | Code | Result |
/// |------|--------|
/// | `+ - * /` | Per-year arithmetic over the common years |
/// | `CAGR` | Growth rate over the lookback, stored at the latest year |
/// | `AVERAGE_PRIOR` | Mean of each year and the year before |
/// | `CONSOLIDATE_FILL` | First component present, per year |
/// | `MIN_RATIO_N_YEARS` | Static minimum ratio over the lookback |
///
/// ```text
/// CAGR = (latest / base)^(1 / years) - 1,  base year = latest year - years
/// ```
pub mod eval {
    pub use metrica_eval::*;
}

// ============================================================================
// Split Adjustment
// ============================================================================

/// Stock split detection and history restatement.
pub mod splits {
    pub use metrica_splits::*;
}

// ============================================================================
// Prelude
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```
/// use metrica::prelude::*;
///
/// let engine = Engine::with_defaults(EngineConfig::default());
/// assert!(engine.validate().is_ok());
/// ```
pub mod prelude {
    pub use crate::eval::{EquationTable, Evaluator, OrderingPolicy};
    pub use crate::resolve::{CompanyResolver, RawObservation, Resolver, default_candidates};
    pub use crate::splits::{SplitAdjuster, SplitEvent};
    pub use crate::{CompanyMetrics, Engine, EngineConfig};
    pub use crate::{FiscalYear, MetricStore, MetricaError, Result, StaticAssumptions, TimeSeries};
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
    }

    #[test]
    fn test_error_types() {
        let _result: Result<()> = Ok(());
        let error = MetricaError::InvalidData("test".to_string());
        assert!(!error.is_fatal());
    }
}
