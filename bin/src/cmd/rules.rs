//! Rule listing command implementation.

use anyhow::Result;
use metrica::eval::{EquationRule, EquationTable, available_categories, rules_by_category};

/// List derived metric rules, optionally filtered by category.
pub(crate) fn list_rules(category: Option<&str>, verbose: bool, json: bool) -> Result<()> {
    if json {
        println!("{}", EquationTable::with_defaults().to_json()?);
        return Ok(());
    }

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                   Derived Metric Rules                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    for cat in available_categories() {
        let cat_name = cat.to_string();
        if let Some(filter) = category
            && !cat_name.to_lowercase().contains(&filter.to_lowercase())
        {
            continue;
        }

        let rules = rules_by_category(&cat);
        if rules.is_empty() {
            continue;
        }

        println!("{} - {}", cat_name, cat.description());
        println!("{}", "-".repeat(60));

        for rule in &rules {
            if verbose {
                println!("  {}", rule.name());
                println!("      = {}", formula(rule));
                if let Some(description) = rule.description() {
                    println!("      {}", description);
                }
            } else {
                println!("  {}", rule.name());
            }
        }
        println!();
    }

    if !verbose {
        println!("Use --verbose for formulas and descriptions.\n");
    }

    Ok(())
}

/// Render a rule as a readable formula.
pub(crate) fn formula(rule: &EquationRule) -> String {
    let components: Vec<String> = rule.components().iter().map(ToString::to_string).collect();
    let mut text = if rule.operation().is_arithmetic() {
        components.join(&format!(" {} ", rule.operation()))
    } else {
        format!("{}({})", rule.operation(), components.join(", "))
    };
    if let Some(years) = rule.lookback() {
        text.push_str(&format!(" over {} years", years));
    }
    let scale = rule.scale();
    if (scale - 1.0).abs() > f64::EPSILON {
        text.push_str(&format!(" x {}", scale));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrica::eval::get_rule_info;

    #[test]
    fn test_formula_arithmetic() {
        let rule = get_rule_info("Free Cash Flow").unwrap();
        assert_eq!(
            formula(&rule),
            "Cash From Operations - Payments To Acquire PP&E"
        );
    }

    #[test]
    fn test_formula_cagr() {
        let rule = get_rule_info("Earnings Per Share (EPS) CAGR (3-Year) (%)").unwrap();
        assert_eq!(
            formula(&rule),
            "CAGR(Earnings Per Share (EPS)) over 3 years x 100"
        );
    }
}
