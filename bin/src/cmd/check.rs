//! Table validation command implementation.

use crate::data;
use anyhow::Result;
use metrica::eval::OrderingPolicy;
use metrica::{Engine, EngineConfig};
use std::path::Path;
use std::sync::Arc;

/// Load rule and candidate tables and check that every rule input is bound.
pub(crate) fn check_tables(rules: Option<&Path>, candidates: Option<&Path>) -> Result<()> {
    let config = EngineConfig::from_env()?;
    let policy = if rules.is_some() {
        config.ordering
    } else {
        OrderingPolicy::Declared
    };

    let equations = data::load_rules(rules, policy)?;
    let candidate_table = data::load_candidates(candidates)?;

    println!("Rules:      {} ({} skipped)", equations.len(), equations.skipped().len());
    println!("Candidates: {}", candidate_table.len());
    println!("Ordering:   {:?}", equations.policy());

    for skipped in equations.skipped() {
        println!("  skipped {}: {}", skipped.name, skipped.reason);
    }

    let engine = Engine::new(Arc::new(candidate_table), Arc::new(equations), config);
    engine.validate()?;

    println!("\nAll rule inputs are bound.");
    Ok(())
}
