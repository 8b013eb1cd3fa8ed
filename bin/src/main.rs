//! Metrica CLI binary.
//!
//! Provides a command-line interface for the metrica metric engine.

mod cmd;
mod data;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "metrica")]
#[command(about = "Derive comparable financial metrics from company disclosures", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List derived metric rules
    Rules {
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// Show formulas and descriptions
        #[arg(short, long)]
        verbose: bool,

        /// Print the rule table as JSON
        #[arg(long)]
        json: bool,
    },

    /// List raw metrics and their candidate tags
    Candidates {
        /// Show only this metric
        metric: Option<String>,

        /// Print the candidate table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate rule and candidate tables
    Check {
        /// Rule table JSON (defaults to the built-in rules)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Candidate table JSON (defaults to the built-in candidates)
        #[arg(short, long)]
        candidates: Option<PathBuf>,
    },

    /// Compute metrics for one company
    Compute {
        /// SEC companyfacts JSON document
        #[arg(short, long, conflicts_with_all = ["facts_dir", "tickers"])]
        facts: Option<PathBuf>,

        /// Ticker to look up in the facts directory
        #[arg(short, long, requires_all = ["facts_dir", "tickers"])]
        ticker: Option<String>,

        /// Directory of CIK##########.json companyfacts documents
        #[arg(long)]
        facts_dir: Option<PathBuf>,

        /// SEC company_tickers.json mapping tickers to CIKs
        #[arg(long)]
        tickers: Option<PathBuf>,

        /// Daily closes as a JSON array of {"date", "close"}
        #[arg(short, long)]
        prices: Option<PathBuf>,

        /// Fiscal year end (MM-DD)
        #[arg(long, default_value = "12-31")]
        year_end: String,

        /// Most recent fiscal year to consider
        #[arg(long)]
        as_of: Option<i32>,

        /// Minimum fiscal years a metric needs
        #[arg(long)]
        min_history: Option<usize>,

        /// Rule table JSON (defaults to the built-in rules)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rules {
            category,
            verbose,
            json,
        } => {
            cmd::rules::list_rules(category.as_deref(), verbose, json)?;
        }
        Commands::Candidates { metric, json } => {
            cmd::candidates::list_candidates(metric.as_deref(), json)?;
        }
        Commands::Check { rules, candidates } => {
            cmd::check::check_tables(rules.as_deref(), candidates.as_deref())?;
        }
        Commands::Compute {
            facts,
            ticker,
            facts_dir,
            tickers,
            prices,
            year_end,
            as_of,
            min_history,
            rules,
            json,
        } => {
            let source = match (facts, ticker, facts_dir, tickers) {
                (Some(path), _, _, _) => cmd::compute::Source::Document(path),
                (None, Some(ticker), Some(facts_dir), Some(tickers)) => {
                    cmd::compute::Source::Ticker {
                        ticker,
                        facts_dir,
                        tickers,
                    }
                }
                _ => anyhow::bail!(
                    "either --facts or --ticker with --facts-dir and --tickers is required"
                ),
            };
            let options = cmd::compute::ComputeOptions {
                prices,
                year_end: data::parse_year_end(&year_end)?,
                as_of,
                min_history,
                rules,
                json,
            };
            cmd::compute::compute(source, &options)?;
        }
    }

    Ok(())
}
