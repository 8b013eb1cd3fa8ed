//! Input loading for the metrica CLI.

use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate};
use metrica::eval::{EquationTable, OrderingPolicy};
use metrica::resolve::{
    CandidateTable, CompanyFactsDocument, DailyClose, FiscalYearEnd, RawObservation,
    default_candidates,
};
use std::fs;
use std::path::Path;

/// Read a companyfacts document and flatten it into observations.
pub(crate) fn load_observations(path: &Path) -> Result<Vec<RawObservation>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading facts from {}", path.display()))?;
    let document = CompanyFactsDocument::from_json(&json)?;
    Ok(document.observations())
}

/// Leap year used to validate `MM-DD` so that `02-29` is accepted.
const REFERENCE_YEAR: i32 = 2000;

/// Read daily closes from a JSON array of `{"date": "YYYY-MM-DD", "close": f64}`.
pub(crate) fn load_prices(path: &Path) -> Result<Vec<DailyClose>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading prices from {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing prices in {}", path.display()))
}

/// Load a rule table, or the built-in rules when `path` is `None`.
pub(crate) fn load_rules(path: Option<&Path>, policy: OrderingPolicy) -> Result<EquationTable> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading rules from {}", path.display()))?;
            Ok(EquationTable::from_json(&json, policy)?)
        }
        None => Ok(EquationTable::with_defaults()),
    }
}

/// Load a candidate table, or the built-in candidates when `path` is `None`.
pub(crate) fn load_candidates(path: Option<&Path>) -> Result<CandidateTable> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading candidates from {}", path.display()))?;
            Ok(CandidateTable::from_json(&json)?)
        }
        None => Ok(default_candidates()),
    }
}

/// Parse a fiscal year end in `MM-DD` format.
pub(crate) fn parse_year_end(text: &str) -> Result<FiscalYearEnd> {
    let trimmed = text.trim();
    if trimmed.len() != 5 {
        bail!("Invalid fiscal year end '{}': expected MM-DD", text);
    }
    let date = NaiveDate::parse_from_str(&format!("{REFERENCE_YEAR}-{trimmed}"), "%Y-%m-%d")
        .with_context(|| format!("Invalid fiscal year end '{}': not a calendar day", text))?;
    Ok(FiscalYearEnd {
        month: date.month(),
        day: date.day(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_year_end() {
        assert_eq!(parse_year_end("12-31").unwrap(), FiscalYearEnd { month: 12, day: 31 });
        assert_eq!(parse_year_end(" 09-30 ").unwrap(), FiscalYearEnd { month: 9, day: 30 });
        assert!(parse_year_end("1231").is_err());
        assert!(parse_year_end("13-01").is_err());
        assert!(parse_year_end("06-xx").is_err());
        assert!(parse_year_end("02-31").is_err());
        assert!(parse_year_end("04-31").is_err());
        assert_eq!(parse_year_end("02-29").unwrap(), FiscalYearEnd { month: 2, day: 29 });
    }

    #[test]
    fn test_load_prices() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"date": "2023-12-29", "close": 192.5}}, {{"date": "2022-12-30", "close": 129.9}}]"#
        )
        .unwrap();

        let prices = load_prices(file.path()).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].close, 192.5);
    }

    #[test]
    fn test_default_tables_without_paths() {
        assert!(!load_rules(None, OrderingPolicy::Topological).unwrap().is_empty());
        assert!(!load_candidates(None).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_observations(&dir.path().join("missing.json")).is_err());
    }
}
