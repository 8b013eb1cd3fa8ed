#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/metrica/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Shared data contract for the metrica engine.
//!
//! This crate defines the canonical year-keyed [`TimeSeries`], the
//! [`MetricStore`] every pipeline stage reads and writes, the error taxonomy,
//! and the normalization boundary that turns raw scrape payloads into
//! canonical series.

/// The version of the metrica-types crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod normalize;
pub mod series;
pub mod store;

pub use error::{MetricaError, Result};
pub use normalize::{NormalizeConfig, RawPayload, RawValue, YearKey, normalize};
pub use series::{FiscalYear, MAX_FISCAL_YEAR, MIN_FISCAL_YEAR, TimeSeries, is_canonical_year};
pub use store::{MetricStore, StaticAssumptions};
