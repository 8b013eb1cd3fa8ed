//! The per-company computation pipeline.

use crate::config::EngineConfig;
use indexmap::IndexMap;
use metrica_eval::{EquationTable, EvaluationReport, Evaluator};
use metrica_resolve::{
    CLOSING_PRICE, CandidateTable, CompanyResolution, CompanyResolver, Coverage, RawObservation,
    Resolver, ResolverConfig, default_candidates,
};
use metrica_splits::{SplitAdjuster, SplitEvent, SplitTargets};
use metrica_types::{
    FiscalYear, MetricStore, MetricaError, Result, StaticAssumptions, TimeSeries, normalize,
};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything computed for one company.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyMetrics {
    /// Ticker, when the run started from one
    pub ticker: Option<String>,
    /// Raw and derived series
    pub store: MetricStore,
    /// Year-invariant assumptions
    pub statics: StaticAssumptions,
    /// Resolver coverage per raw metric
    pub coverage: IndexMap<String, Coverage>,
    /// Metrics no candidate supplied any data for
    pub unresolved: Vec<String>,
    /// Metrics dropped for insufficient history
    pub short_history: Vec<String>,
    /// Confirmed stock splits, oldest first
    pub splits: Vec<SplitEvent>,
    /// Evaluation outcome per rule
    pub report: EvaluationReport,
}

impl CompanyMetrics {
    /// Value of `metric` at `year`.
    #[must_use]
    pub fn value(&self, metric: &str, year: FiscalYear) -> Option<f64> {
        self.store.value(metric, year)
    }

    /// Series for `metric`.
    #[must_use]
    pub fn series(&self, metric: &str) -> Option<&TimeSeries> {
        self.store.get(metric)
    }

    /// Long-format snapshot of every series.
    ///
    /// # Errors
    ///
    /// Returns an error if the DataFrame cannot be constructed.
    pub fn to_frame(&self) -> Result<DataFrame> {
        self.store.to_frame()
    }
}

/// Resolves, normalizes, split-adjusts and derives metrics for one company at
/// a time.
///
/// The engine holds only shared, read-only tables and is `Send + Sync`, so
/// callers may process companies in parallel.
#[derive(Debug, Clone)]
pub struct Engine {
    resolver: Resolver,
    evaluator: Evaluator,
    adjuster: SplitAdjuster,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_defaults(EngineConfig::default())
    }
}

impl Engine {
    /// Create an engine over the given tables.
    #[must_use]
    pub fn new(
        candidates: Arc<CandidateTable>,
        equations: Arc<EquationTable>,
        config: EngineConfig,
    ) -> Self {
        let resolver = Resolver::new(
            candidates,
            ResolverConfig {
                window: config.window(),
            },
        );
        Self {
            resolver,
            evaluator: Evaluator::new(equations),
            adjuster: SplitAdjuster::new(config.split.clone(), SplitTargets::default()),
            config,
        }
    }

    /// Create an engine over the built-in candidate and equation tables.
    #[must_use]
    pub fn with_defaults(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(default_candidates()),
            Arc::new(EquationTable::with_defaults()),
            config,
        )
    }

    /// Replace the split targets.
    #[must_use]
    pub fn with_split_targets(mut self, targets: SplitTargets) -> Self {
        self.adjuster = SplitAdjuster::new(self.config.split.clone(), targets);
        self
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The candidate table.
    #[must_use]
    pub fn candidates(&self) -> &CandidateTable {
        self.resolver.table()
    }

    /// The equation table.
    #[must_use]
    pub fn equations(&self) -> &EquationTable {
        self.evaluator.table()
    }

    /// Check that every equation component is bound to a candidate metric,
    /// produced by another rule, or is the injected closing price.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::UnknownComponent`] for the first unbound name.
    pub fn validate(&self) -> Result<()> {
        let known = self
            .candidates()
            .metrics()
            .chain(std::iter::once(CLOSING_PRICE));
        self.equations().validate_bindings(known)
    }

    /// Run the pipeline over one company's raw observations.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::ContractViolation`] if a non-canonical fiscal
    /// year reaches evaluation. Missing data never errors.
    pub fn run(
        &self,
        observations: &[RawObservation],
        closing_prices: &TimeSeries,
    ) -> Result<CompanyMetrics> {
        let resolution = self.resolver.resolve(observations);
        self.run_resolution(resolution, closing_prices)
    }

    /// Run the pipeline for `ticker`, fetching observations through `company`.
    ///
    /// Resolution uses this engine's candidate table, not the one inside
    /// `company`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ticker is unknown, the facts cannot be read, or
    /// a contract violation occurs.
    pub fn run_ticker(
        &self,
        ticker: &str,
        company: &CompanyResolver,
        closing_prices: &TimeSeries,
    ) -> Result<CompanyMetrics> {
        let observations = company.observations(ticker)?;
        let mut resolution = self.resolver.resolve(&observations);
        resolution.ticker = Some(ticker.to_uppercase());
        self.run_resolution(resolution, closing_prices)
    }

    /// Run everything after resolution: normalize, inject prices, adjust for
    /// splits, enforce minimum history and evaluate.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::ContractViolation`] if a non-canonical fiscal
    /// year reaches evaluation.
    pub fn run_resolution(
        &self,
        resolution: CompanyResolution,
        closing_prices: &TimeSeries,
    ) -> Result<CompanyMetrics> {
        let ticker = resolution.ticker.clone();
        let label = ticker.as_deref().unwrap_or("<unnamed>");
        let fatal = |err: MetricaError| {
            if err.is_fatal() {
                tracing::error!(ticker = label, error = %err, "aborting company run");
            }
            err
        };

        let payloads = resolution.payloads();
        let mut store = normalize(&payloads, &self.config.normalize()).map_err(fatal)?;

        let prices = self.annual_prices(closing_prices);
        if !prices.is_empty() {
            store.insert(CLOSING_PRICE, prices);
        }

        let splits = self.adjuster.apply(&mut store);
        let short_history = store.retain_min_history(self.config.min_history_years);

        let mut statics = StaticAssumptions::new();
        let report = self
            .evaluator
            .evaluate(&mut store, &mut statics)
            .map_err(fatal)?;

        tracing::info!(
            ticker = label,
            metrics = store.len(),
            derived = report.computed.len(),
            omitted = report.omitted.len(),
            unresolved = resolution.unresolved.len(),
            short_history = short_history.len(),
            splits = splits.len(),
            "computed company metrics"
        );

        Ok(CompanyMetrics {
            coverage: resolution.coverage(),
            unresolved: resolution.unresolved,
            ticker,
            store,
            statics,
            short_history,
            splits,
            report,
        })
    }

    /// Closing prices up to the as-of year, trimmed to the history window.
    fn annual_prices(&self, closing_prices: &TimeSeries) -> TimeSeries {
        let as_of = self.config.as_of_year();
        let mut prices: TimeSeries = closing_prices
            .iter()
            .filter(|(year, _)| *year <= as_of)
            .collect();
        if let Some(window) = self.config.history_window {
            prices.retain_recent(window);
        }
        prices
    }
}
