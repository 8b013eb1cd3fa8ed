//! End-to-end runs of the per-company pipeline.

use approx::assert_relative_eq;
use metrica::prelude::*;
use metrica::resolve::{FactsSource, FormType, StaticDirectory, TickerDirectory, pad_cik};
use std::collections::HashMap;
use std::sync::Arc;

fn config() -> EngineConfig {
    EngineConfig {
        as_of_year: Some(2023),
        ..EngineConfig::default()
    }
}

fn shares(tag: &str, year: FiscalYear, value: f64) -> RawObservation {
    RawObservation::new(tag, year, value, FormType::Annual, "shares")
}

/// Five years of a company that did a 2:1 split in fiscal 2022.
fn observations() -> Vec<RawObservation> {
    let mut obs = Vec::new();
    for year in 2019..=2023 {
        let post_split = year >= 2022;
        let revenue = 1_000.0 + f64::from(year - 2019) * 100.0;
        obs.push(RawObservation::annual_usd("Revenues", year, revenue));
        obs.push(RawObservation::annual_usd("NetIncomeLoss", year, 100.0));
        obs.push(shares(
            "CommonStockSharesOutstanding",
            year,
            if post_split { 100.0 } else { 50.0 },
        ));
    }
    obs
}

fn prices() -> TimeSeries {
    (2019..=2023)
        .map(|year| (year, if year >= 2022 { 20.0 } else { 40.0 }))
        .collect()
}

#[test]
fn split_adjusted_market_cap() {
    let engine = Engine::with_defaults(config());
    let metrics = engine.run(&observations(), &prices()).unwrap();

    assert_eq!(metrics.splits, vec![SplitEvent { year: 2022, factor: 2.0 }]);
    for year in 2019..=2023 {
        assert_relative_eq!(metrics.value("Total Common Shares Outstanding", year).unwrap(), 100.0);
        assert_relative_eq!(metrics.value("Closing Price (USD)", year).unwrap(), 20.0);
        assert_relative_eq!(metrics.value("Market Cap", year).unwrap(), 2_000.0);
        assert_relative_eq!(metrics.value("Earnings Per Share (EPS)", year).unwrap(), 1.0);
        assert_relative_eq!(metrics.value("P/E Ratio (Calculated)", year).unwrap(), 20.0);
    }
    assert!(metrics.report.computed.iter().any(|m| m == "Market Cap"));
    assert!(metrics.report.is_omitted("Enterprise Value"));
    assert!(metrics.coverage["Total Revenue"].full);
}

#[test]
fn short_history_is_excluded_from_derivation() {
    let mut obs = observations();
    obs.extend((2021..=2023).map(|y| RawObservation::annual_usd("Assets", y, 5_000.0)));

    let metrics = Engine::with_defaults(config()).run(&obs, &prices()).unwrap();

    assert!(metrics.short_history.iter().any(|m| m == "Total Assets"));
    assert!(metrics.series("Total Assets").is_none());
    assert!(metrics.series("Average Total Assets").is_none());
    assert!(metrics.report.is_omitted("Average Total Assets"));
}

#[test]
fn prices_alone_do_not_error() {
    let metrics = Engine::with_defaults(config()).run(&[], &prices()).unwrap();

    assert_eq!(metrics.store.len(), 1);
    assert!(metrics.splits.is_empty());
    assert!(metrics.statics.is_empty());
}

#[test]
fn non_canonical_year_is_fatal() {
    let mut bad_prices = prices();
    bad_prices.insert(12, 30.0);

    let err = Engine::with_defaults(config())
        .run(&observations(), &bad_prices)
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, MetricaError::ContractViolation { .. }));
}

#[derive(Debug, Default)]
struct MemoryFacts {
    by_cik: HashMap<String, Vec<RawObservation>>,
}

impl FactsSource for MemoryFacts {
    fn company_facts(&self, cik: &str) -> metrica::Result<Vec<RawObservation>> {
        self.by_cik
            .get(cik)
            .cloned()
            .ok_or_else(|| MetricaError::DataSource(format!("no facts for {cik}")))
    }
}

fn company_resolver(engine: &Engine) -> CompanyResolver {
    let mut facts = MemoryFacts::default();
    facts.by_cik.insert(pad_cik(320_193), observations());

    let directory = TickerDirectory::new(StaticDirectory::new([("aapl", 320_193)]));
    let resolver = Resolver::new(
        Arc::new(engine.candidates().clone()),
        metrica::resolve::ResolverConfig {
            window: engine.config().window(),
        },
    );
    CompanyResolver::new(Arc::new(directory), Arc::new(facts), resolver)
}

#[test]
fn run_by_ticker() {
    let engine = Engine::with_defaults(config());
    let company = company_resolver(&engine);

    let metrics = engine.run_ticker("aapl", &company, &prices()).unwrap();
    assert_eq!(metrics.ticker.as_deref(), Some("AAPL"));
    assert_relative_eq!(metrics.value("Market Cap", 2023).unwrap(), 2_000.0);

    let json = serde_json::to_string(&metrics).unwrap();
    assert!(json.contains("Market Cap"));
    assert!(metrics.to_frame().unwrap().height() > 0);
}

#[test]
fn unknown_ticker_is_reported() {
    let engine = Engine::with_defaults(config());
    let company = company_resolver(&engine);

    let err = engine.run_ticker("MSFT", &company, &prices()).unwrap_err();
    assert!(matches!(err, MetricaError::TickerNotFound(_)));
    assert!(!err.is_fatal());
}
