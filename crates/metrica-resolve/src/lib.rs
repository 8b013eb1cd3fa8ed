#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/metrica/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Tag fallback resolution for the metrica engine.
//!
//! Turns a company's raw disclosure observations into one chosen series per
//! abstract metric, together with coverage metadata that tells callers how
//! complete the chosen data is.

/// The version of the metrica-resolve crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod candidate;
pub mod companyfacts;
pub mod defaults;
pub mod directory;
pub mod observation;
pub mod prices;
pub mod resolver;

pub use candidate::{
    CALCULATION_MARKER, CandidateRepr, CandidateSpec, CandidateTable, MetricBinding, Sign,
};
pub use companyfacts::{CompanyFactsDocument, FactValue, TagFacts};
pub use defaults::default_candidates;
pub use directory::{
    CikMap, CompanyResolver, DirectorySource, FactsDirectory, FactsSource, JsonFileDirectory,
    StaticDirectory, TickerDirectory, pad_cik, parse_company_tickers,
};
pub use observation::{FormType, RawObservation, UnitFamily};
pub use prices::{CLOSING_PRICE, DailyClose, FiscalYearEnd, annual_closes};
pub use resolver::{
    AnnualFacts, CandidateOutcome, CompanyResolution, Coverage, DEFAULT_TARGET_YEARS,
    RecentWindow, Resolution, Resolver, ResolverConfig, Selection,
};
