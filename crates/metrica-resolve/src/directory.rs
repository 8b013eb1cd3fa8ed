//! Ticker directory cache and retrieval seams.
//!
//! [`TickerDirectory`] maps tickers to zero-padded 10-digit CIKs. It is an
//! explicit cache object: it loads lazily from an injected [`DirectorySource`]
//! and reloads only when [`TickerDirectory::refresh`] is called.
//! [`FactsSource`] is the seam for whatever retrieves a company's facts.

use crate::companyfacts::CompanyFactsDocument;
use crate::observation::RawObservation;
use crate::resolver::{CompanyResolution, Resolver};
use metrica_types::{MetricaError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Ticker to CIK map.
pub type CikMap = HashMap<String, String>;

/// Format a CIK as the zero-padded 10-digit identifier.
#[must_use]
pub fn pad_cik(cik: u64) -> String {
    format!("{cik:010}")
}

#[derive(Debug, Deserialize)]
struct CompanyTickerEntry {
    cik_str: CikValue,
    ticker: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CikValue {
    Number(u64),
    Text(String),
}

/// Decode the SEC `company_tickers.json` shape
/// (`{"0": {"cik_str": 320193, "ticker": "AAPL", "title": "..."}, ...}`).
///
/// Tickers are upper-cased. Entries with a non-numeric CIK are skipped.
///
/// # Errors
///
/// Returns [`MetricaError::Json`] if the document is malformed.
pub fn parse_company_tickers(json: &str) -> Result<CikMap> {
    let entries: BTreeMap<String, CompanyTickerEntry> = serde_json::from_str(json)?;
    let mut map = CikMap::with_capacity(entries.len());
    for entry in entries.into_values() {
        let cik = match entry.cik_str {
            CikValue::Number(n) => n,
            CikValue::Text(s) => match s.trim().parse() {
                Ok(n) => n,
                Err(_) => continue,
            },
        };
        map.insert(entry.ticker.to_uppercase(), pad_cik(cik));
    }
    Ok(map)
}

/// Loads the full ticker to CIK map.
pub trait DirectorySource: Send + Sync + fmt::Debug {
    /// Load the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or decoded.
    fn load(&self) -> Result<CikMap>;
}

/// Directory source backed by a saved `company_tickers.json` file.
#[derive(Debug, Clone)]
pub struct JsonFileDirectory {
    path: PathBuf,
}

impl JsonFileDirectory {
    /// Read from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DirectorySource for JsonFileDirectory {
    fn load(&self) -> Result<CikMap> {
        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            MetricaError::DataSource(format!("reading {}: {e}", self.path.display()))
        })?;
        parse_company_tickers(&json)
    }
}

/// In-memory directory source.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: CikMap,
}

impl StaticDirectory {
    /// Build from `(ticker, cik)` pairs.
    #[must_use]
    pub fn new<I, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (T, u64)>,
        T: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(t, cik)| (t.as_ref().to_uppercase(), pad_cik(cik)))
                .collect(),
        }
    }
}

impl DirectorySource for StaticDirectory {
    fn load(&self) -> Result<CikMap> {
        Ok(self.entries.clone())
    }
}

/// Process-scoped, refreshable ticker to CIK cache.
#[derive(Debug)]
pub struct TickerDirectory {
    source: Box<dyn DirectorySource>,
    cache: RwLock<Option<Arc<CikMap>>>,
}

impl TickerDirectory {
    /// Create an empty cache over `source`. Nothing is loaded until first use.
    #[must_use]
    pub fn new(source: impl DirectorySource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RwLock::new(None),
        }
    }

    fn poisoned() -> MetricaError {
        MetricaError::DataSource("ticker directory lock poisoned".to_string())
    }

    fn snapshot(&self) -> Result<Arc<CikMap>> {
        if let Some(map) = self.cache.read().map_err(|_| Self::poisoned())?.as_ref() {
            return Ok(Arc::clone(map));
        }
        let mut guard = self.cache.write().map_err(|_| Self::poisoned())?;
        if let Some(map) = guard.as_ref() {
            return Ok(Arc::clone(map));
        }
        let map = Arc::new(self.source.load()?);
        tracing::debug!(entries = map.len(), "loaded ticker directory");
        *guard = Some(Arc::clone(&map));
        Ok(map)
    }

    /// Force a reload from the source. Returns the number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails; the previous cache is kept.
    pub fn refresh(&self) -> Result<usize> {
        let map = Arc::new(self.source.load()?);
        let len = map.len();
        *self.cache.write().map_err(|_| Self::poisoned())? = Some(map);
        tracing::debug!(entries = len, "refreshed ticker directory");
        Ok(len)
    }

    /// Look up the CIK for `ticker` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be loaded.
    pub fn lookup(&self, ticker: &str) -> Result<Option<String>> {
        Ok(self.snapshot()?.get(&ticker.trim().to_uppercase()).cloned())
    }

    /// CIK for `ticker`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::TickerNotFound`] if the ticker is unknown.
    pub fn cik(&self, ticker: &str) -> Result<String> {
        self.lookup(ticker)?
            .ok_or_else(|| MetricaError::TickerNotFound(ticker.to_string()))
    }

    /// Whether the cache has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cache.read().is_ok_and(|guard| guard.is_some())
    }
}

/// Supplies a company's raw observations by CIK.
pub trait FactsSource: Send + Sync + fmt::Debug {
    /// Observations for the company with the given zero-padded CIK.
    ///
    /// # Errors
    ///
    /// Returns an error if the facts cannot be retrieved or decoded.
    fn company_facts(&self, cik: &str) -> Result<Vec<RawObservation>>;
}

/// Facts source over a directory of saved `CIK##########.json` documents,
/// the layout of the SEC bulk `companyfacts` archive.
#[derive(Debug, Clone)]
pub struct FactsDirectory {
    root: PathBuf,
}

impl FactsDirectory {
    /// Read documents from `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FactsSource for FactsDirectory {
    fn company_facts(&self, cik: &str) -> Result<Vec<RawObservation>> {
        let path = self.root.join(format!("CIK{cik}.json"));
        let json = std::fs::read_to_string(&path)
            .map_err(|e| MetricaError::DataSource(format!("reading {}: {e}", path.display())))?;
        Ok(CompanyFactsDocument::from_json(&json)?.observations())
    }
}

/// Resolves one ticker end to end: directory, facts source, then resolver.
#[derive(Debug, Clone)]
pub struct CompanyResolver {
    directory: Arc<TickerDirectory>,
    facts: Arc<dyn FactsSource>,
    resolver: Resolver,
}

impl CompanyResolver {
    /// Compose the retrieval seams with a resolver.
    #[must_use]
    pub fn new(
        directory: Arc<TickerDirectory>,
        facts: Arc<dyn FactsSource>,
        resolver: Resolver,
    ) -> Self {
        Self {
            directory,
            facts,
            resolver,
        }
    }

    /// Raw observations for `ticker`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ticker is unknown or the facts cannot be read.
    pub fn observations(&self, ticker: &str) -> Result<Vec<RawObservation>> {
        let cik = self.directory.cik(ticker)?;
        self.facts.company_facts(&cik)
    }

    /// Resolve every bound metric for `ticker`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ticker is unknown or the facts cannot be read.
    pub fn resolve(&self, ticker: &str) -> Result<CompanyResolution> {
        let observations = self.observations(ticker)?;
        let mut company = self.resolver.resolve(&observations);
        company.ticker = Some(ticker.to_uppercase());
        Ok(company)
    }

    /// The underlying resolver.
    #[must_use]
    pub const fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{CandidateSpec, CandidateTable, MetricBinding};
    use crate::resolver::{RecentWindow, ResolverConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingSource {
        loads: AtomicUsize,
    }

    impl DirectorySource for CountingSource {
        fn load(&self) -> Result<CikMap> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            StaticDirectory::new([("AAPL", 320_193)]).load()
        }
    }

    #[derive(Debug)]
    struct FixedFacts(Vec<RawObservation>);

    impl FactsSource for FixedFacts {
        fn company_facts(&self, cik: &str) -> Result<Vec<RawObservation>> {
            assert_eq!(cik, "0000320193");
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_parse_company_tickers() {
        let map = parse_company_tickers(
            r#"{
                "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
                "1": {"cik_str": "789019", "ticker": "msft", "title": "Microsoft"},
                "2": {"cik_str": "n/a", "ticker": "BAD", "title": "Bad"}
            }"#,
        )
        .unwrap();
        assert_eq!(map.get("AAPL").map(String::as_str), Some("0000320193"));
        assert_eq!(map.get("MSFT").map(String::as_str), Some("0000789019"));
        assert!(!map.contains_key("BAD"));
    }

    #[test]
    fn test_directory_caches_until_refresh() {
        let directory = TickerDirectory::new(CountingSource::default());
        assert!(!directory.is_loaded());

        assert_eq!(directory.cik("aapl").unwrap(), "0000320193");
        assert_eq!(directory.cik("AAPL").unwrap(), "0000320193");
        assert!(directory.is_loaded());
        assert!(matches!(
            directory.cik("ZZZZ"),
            Err(MetricaError::TickerNotFound(_))
        ));

        assert_eq!(directory.refresh().unwrap(), 1);
    }

    #[test]
    fn test_refresh_counts_loads() {
        let source = Arc::new(CountingSource::default());

        #[derive(Debug)]
        struct Shared(Arc<CountingSource>);
        impl DirectorySource for Shared {
            fn load(&self) -> Result<CikMap> {
                self.0.load()
            }
        }

        let directory = TickerDirectory::new(Shared(Arc::clone(&source)));
        directory.lookup("AAPL").unwrap();
        directory.lookup("AAPL").unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        directory.refresh().unwrap();
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_company_resolver() {
        let mut table = CandidateTable::new();
        table.insert(
            "Net Income",
            MetricBinding::monetary(vec![CandidateSpec::tag("NetIncomeLoss")]),
        );
        let resolver = Resolver::new(
            Arc::new(table),
            ResolverConfig {
                window: RecentWindow::new(2023, 2),
            },
        );
        let facts = FixedFacts(vec![
            RawObservation::annual_usd("NetIncomeLoss", 2022, 1.0),
            RawObservation::annual_usd("NetIncomeLoss", 2023, 2.0),
        ]);
        let company = CompanyResolver::new(
            Arc::new(TickerDirectory::new(StaticDirectory::new([("AAPL", 320_193)]))),
            Arc::new(facts),
            resolver,
        );

        let resolution = company.resolve("aapl").unwrap();
        assert_eq!(resolution.ticker.as_deref(), Some("AAPL"));
        assert!(resolution.get("Net Income").unwrap().coverage.full);
    }
}
