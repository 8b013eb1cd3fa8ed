//! Metric computation command implementation.

use crate::data;
use anyhow::Result;
use metrica::eval::OrderingPolicy;
use metrica::resolve::{
    CompanyResolver, FactsDirectory, FiscalYearEnd, JsonFileDirectory, Resolver, ResolverConfig,
    TickerDirectory, annual_closes, default_candidates,
};
use metrica::{CompanyMetrics, Engine, EngineConfig, FiscalYear, TimeSeries};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Number of fiscal years shown in the text report.
const REPORT_YEARS: usize = 5;

/// Where a company's raw facts come from.
#[derive(Debug)]
pub(crate) enum Source {
    /// A single companyfacts document
    Document(PathBuf),
    /// A ticker resolved through a ticker map and a facts directory
    Ticker {
        ticker: String,
        facts_dir: PathBuf,
        tickers: PathBuf,
    },
}

/// Options shared by every source.
#[derive(Debug)]
pub(crate) struct ComputeOptions {
    pub(crate) prices: Option<PathBuf>,
    pub(crate) year_end: FiscalYearEnd,
    pub(crate) as_of: Option<FiscalYear>,
    pub(crate) min_history: Option<usize>,
    pub(crate) rules: Option<PathBuf>,
    pub(crate) json: bool,
}

/// Run the engine for one company and print the result.
pub(crate) fn compute(source: Source, options: &ComputeOptions) -> Result<()> {
    let mut config = EngineConfig::from_env()?;
    if let Some(year) = options.as_of {
        config.as_of_year = Some(year);
    }
    if let Some(years) = options.min_history {
        config.min_history_years = years;
    }

    let policy = if options.rules.is_some() {
        config.ordering
    } else {
        OrderingPolicy::Declared
    };
    let equations = data::load_rules(options.rules.as_deref(), policy)?;
    let engine = Engine::new(Arc::new(default_candidates()), Arc::new(equations), config);
    engine.validate()?;

    let prices = match &options.prices {
        Some(path) => annual_closes(&data::load_prices(path)?, options.year_end),
        None => TimeSeries::new(),
    };

    let metrics = match source {
        Source::Document(path) => {
            let observations = data::load_observations(&path)?;
            tracing::info!(
                observations = observations.len(),
                path = %path.display(),
                "loaded company facts"
            );
            engine.run(&observations, &prices)?
        }
        Source::Ticker {
            ticker,
            facts_dir,
            tickers,
        } => {
            let company = CompanyResolver::new(
                Arc::new(TickerDirectory::new(JsonFileDirectory::new(tickers))),
                Arc::new(FactsDirectory::new(facts_dir)),
                Resolver::new(
                    Arc::new(engine.candidates().clone()),
                    ResolverConfig {
                        window: engine.config().window(),
                    },
                ),
            );
            engine.run_ticker(&ticker, &company, &prices)?
        }
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        print_report(&metrics);
    }
    Ok(())
}

fn print_report(metrics: &CompanyMetrics) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                      Company Metrics                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    if let Some(ticker) = &metrics.ticker {
        println!("Ticker:   {}", ticker);
    }
    println!("Metrics:  {}", metrics.store.len());
    println!("Derived:  {}", metrics.report.computed.len());
    println!("Omitted:  {}", metrics.report.omitted.len());
    println!();

    for split in &metrics.splits {
        let kind = if split.is_reverse() { "reverse" } else { "forward" };
        println!("Split:    {} {} split, factor {}", split.year, kind, split.factor);
    }
    if !metrics.splits.is_empty() {
        println!();
    }

    let years = recent_years(metrics);
    if !years.is_empty() {
        print!("{:45}", "");
        for year in &years {
            print!("{:>14}", year);
        }
        println!();
        println!("{}", "━".repeat(45 + 14 * years.len()));

        for (name, series) in metrics.store.iter() {
            print!("{:45}", truncate(name, 44));
            for year in &years {
                match series.get(*year) {
                    Some(value) => print!("{:>14}", format_value(value)),
                    None => print!("{:>14}", "-"),
                }
            }
            println!();
        }
        println!();
    }

    if !metrics.statics.is_empty() {
        println!("Static assumptions:");
        for (name, value) in metrics.statics.iter() {
            println!("  {:43} {:>14}", name, format_value(value));
        }
        println!();
    }

    if !metrics.report.omitted.is_empty() {
        println!("Omitted:");
        for omission in &metrics.report.omitted {
            println!("  {:43} {}", omission.metric, omission.reason);
        }
        println!();
    }

    if !metrics.short_history.is_empty() {
        println!("Insufficient history: {}", metrics.short_history.join(", "));
        println!();
    }
}

/// The most recent fiscal years present in any series, oldest first.
fn recent_years(metrics: &CompanyMetrics) -> Vec<FiscalYear> {
    let all: BTreeSet<FiscalYear> = metrics
        .store
        .iter()
        .flat_map(|(_, series)| series.years())
        .collect();
    let skip = all.len().saturating_sub(REPORT_YEARS);
    all.into_iter().skip(skip).collect()
}

fn format_value(value: f64) -> String {
    if value.abs() >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else {
        format!("{:.2}", value)
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}
