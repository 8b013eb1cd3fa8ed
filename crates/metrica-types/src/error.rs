//! Error types for the metrica engine.
//!
//! Only two classes of failure ever leave the engine as an `Err`: contract
//! violations (a non-canonical fiscal year crossed the normalization boundary)
//! and configuration tables that cannot be loaded. Missing data is never an
//! error; affected metrics are simply omitted.

use thiserror::Error;

/// The main error type for metrica operations.
#[derive(Debug, Error)]
pub enum MetricaError {
    /// A fiscal year key outside the canonical range reached a consumer.
    ///
    /// This signals a defect in the normalization boundary itself and is fatal.
    #[error("Contract violation: metric '{metric}' carries non-canonical year key {key}")]
    ContractViolation {
        /// Metric whose series carried the key
        metric: String,
        /// Offending key, rendered for diagnostics
        key: String,
    },

    /// An equation rule definition is malformed.
    #[error("Invalid rule '{rule}': {reason}")]
    InvalidRule {
        /// Name of the rule
        rule: String,
        /// What is wrong with it
        reason: String,
    },

    /// A rule references a name that nothing produces.
    #[error("Rule '{rule}' references unknown component '{component}'")]
    UnknownComponent {
        /// Name of the rule
        rule: String,
        /// Unresolvable component name
        component: String,
    },

    /// A rule references another rule declared after it.
    #[error("Rule '{rule}' references '{component}' which is declared later")]
    ForwardReference {
        /// Name of the rule
        rule: String,
        /// Later-declared rule it depends on
        component: String,
    },

    /// The rule table contains a dependency cycle.
    #[error("Dependency cycle between rules: {0:?}")]
    DependencyCycle(Vec<String>),

    /// A candidate spec could not be parsed.
    #[error("Invalid candidate '{spec}': {reason}")]
    InvalidCandidate {
        /// Raw candidate text
        spec: String,
        /// What is wrong with it
        reason: String,
    },

    /// A metric name is not bound in the configuration.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Ticker could not be mapped to a company identifier.
    #[error("Ticker not found: {0}")]
    TickerNotFound(String),

    /// Error from the ticker directory loader or facts collaborator.
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// JSON decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl MetricaError {
    /// Whether this error must abort the run rather than be recovered locally.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ContractViolation { .. })
    }
}

/// A specialized Result type for metrica operations.
pub type Result<T> = std::result::Result<T, MetricaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MetricaError::ContractViolation {
            metric: "Total Revenue".to_string(),
            key: "TTM".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Contract violation: metric 'Total Revenue' carries non-canonical year key TTM"
        );

        let err = MetricaError::UnknownMetric("EBITDA".to_string());
        assert_eq!(err.to_string(), "Unknown metric: EBITDA");
    }

    #[test]
    fn test_only_contract_violation_is_fatal() {
        let fatal = MetricaError::ContractViolation {
            metric: "x".to_string(),
            key: "1".to_string(),
        };
        assert!(fatal.is_fatal());
        assert!(!MetricaError::DependencyCycle(vec!["a".into(), "b".into()]).is_fatal());
        assert!(!MetricaError::InvalidData("bad".into()).is_fatal());
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: MetricaError = parse.unwrap_err().into();
        assert!(matches!(err, MetricaError::Json(_)));
    }
}
