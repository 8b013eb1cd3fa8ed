//! Candidate listing command implementation.

use anyhow::{Result, bail};
use metrica::resolve::default_candidates;

/// List raw metrics and the tags that can supply them.
pub(crate) fn list_candidates(metric: Option<&str>, json: bool) -> Result<()> {
    let table = default_candidates();

    if json {
        println!("{}", table.to_json()?);
        return Ok(());
    }

    if let Some(name) = metric {
        let Some(binding) = table.get(name) else {
            bail!("Unknown metric '{}'. Run `metrica candidates` to list metrics.", name);
        };
        println!("{} ({})", name, binding.unit);
        println!("{}", "-".repeat(60));
        for (rank, candidate) in binding.candidates.iter().enumerate() {
            println!("  {:>2}. {}", rank + 1, candidate);
        }
        println!();
        return Ok(());
    }

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Raw Metric Candidates                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    for (name, binding) in table.iter() {
        println!(
            "  {:40} {:>9}  {} candidate(s)",
            name,
            binding.unit.to_string(),
            binding.candidates.len()
        );
    }
    println!();
    println!("Candidates are tried in order; the first to cover the recent window wins.\n");

    Ok(())
}
