//! Raw disclosure observations.

use derive_more::Display;
use metrica_types::FiscalYear;
use serde::{Deserialize, Serialize};

/// Filing form an observation was reported in.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormType {
    /// Annual report
    #[display("10-K")]
    #[serde(rename = "10-K")]
    Annual,
    /// Quarterly report
    #[display("10-Q")]
    #[serde(rename = "10-Q")]
    Quarterly,
    /// Any other form (8-K, 20-F, amendments, ...)
    #[display("other")]
    #[serde(other)]
    Other,
}

impl FormType {
    /// Classify a form code such as `"10-K"`.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "10-K" => Self::Annual,
            "10-Q" => Self::Quarterly,
            _ => Self::Other,
        }
    }

    /// Whether observations from this form participate in resolution.
    #[must_use]
    pub const fn is_annual(&self) -> bool {
        matches!(self, Self::Annual)
    }
}

/// Unit family a metric is declared in.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitFamily {
    /// Currency amounts (`USD`)
    #[default]
    #[display("monetary")]
    Monetary,
    /// Share counts (`shares`)
    #[display("shares")]
    Shares,
    /// Dimensionless ratios (`pure`, `ratio`)
    #[display("ratio")]
    Ratio,
}

impl UnitFamily {
    /// Map a reported unit string to its family. Unknown units yield `None`.
    #[must_use]
    pub fn from_unit(unit: &str) -> Option<Self> {
        match unit {
            "USD" => Some(Self::Monetary),
            "shares" => Some(Self::Shares),
            "pure" | "ratio" => Some(Self::Ratio),
            _ => None,
        }
    }
}

/// One reported fact from a disclosure source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    /// Taxonomy tag, e.g. `Revenues`
    pub tag: String,
    /// Fiscal year the fact is filed under
    pub fiscal_year: FiscalYear,
    /// Reported value
    pub value: f64,
    /// Filing form
    pub form: FormType,
    /// Reported unit, e.g. `USD` or `shares`
    pub unit: String,
}

impl RawObservation {
    /// Create an observation.
    #[must_use]
    pub fn new(
        tag: impl Into<String>,
        fiscal_year: FiscalYear,
        value: f64,
        form: FormType,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            fiscal_year,
            value,
            form,
            unit: unit.into(),
        }
    }

    /// Annual observation in `USD`.
    #[must_use]
    pub fn annual_usd(tag: impl Into<String>, fiscal_year: FiscalYear, value: f64) -> Self {
        Self::new(tag, fiscal_year, value, FormType::Annual, "USD")
    }

    /// Unit family of the reported unit, if known.
    #[must_use]
    pub fn unit_family(&self) -> Option<UnitFamily> {
        UnitFamily::from_unit(&self.unit)
    }
}
