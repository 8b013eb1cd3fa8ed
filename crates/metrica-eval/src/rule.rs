//! Equation rule definitions.
//!
//! A rule derives one named metric from named components (other metrics or
//! numeric literals) with one of a fixed set of operations. Rules arrive as
//! loosely typed [`RuleDefinition`]s from JSON and are validated into
//! [`EquationRule`]s before they reach a table.

use crate::registry::RuleCategory;
use derive_more::Display;
use metrica_types::{MetricaError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default window for [`Operation::Cagr`].
pub const DEFAULT_CAGR_YEARS: usize = 3;

/// Default lookback for [`Operation::MinRatioNYears`].
pub const DEFAULT_MIN_RATIO_YEARS: usize = 5;

/// One input of a rule.
#[derive(Debug, Display, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Component {
    /// A numeric constant, present in every year
    Literal(f64),
    /// A raw or derived metric, or a static assumption
    Metric(String),
}

impl Component {
    /// Metric name, if this component is not a literal.
    #[must_use]
    pub fn metric_name(&self) -> Option<&str> {
        match self {
            Self::Metric(name) => Some(name),
            Self::Literal(_) => None,
        }
    }

    /// Whether this component is a numeric literal.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

impl From<&str> for Component {
    fn from(name: &str) -> Self {
        Self::Metric(name.to_string())
    }
}

impl From<String> for Component {
    fn from(name: String) -> Self {
        Self::Metric(name)
    }
}

impl From<f64> for Component {
    fn from(value: f64) -> Self {
        Self::Literal(value)
    }
}

/// Operation kinds a rule may apply.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Sum of all components
    #[display("+")]
    #[serde(rename = "+")]
    Add,
    /// First component minus the rest, left to right
    #[display("-")]
    #[serde(rename = "-")]
    Subtract,
    /// Product of all components
    #[display("*")]
    #[serde(rename = "*")]
    Multiply,
    /// First component divided by the rest, left to right
    #[display("/")]
    #[serde(rename = "/")]
    Divide,
    /// Compound annual growth rate anchored at the latest year
    #[display("CAGR")]
    #[serde(rename = "CAGR")]
    Cagr,
    /// Mean of each year and the year before it
    #[display("AVERAGE_PRIOR")]
    #[serde(rename = "AVERAGE_PRIOR")]
    AveragePrior,
    /// First component with a value wins, year by year
    #[display("CONSOLIDATE_FILL")]
    #[serde(rename = "CONSOLIDATE_FILL")]
    ConsolidateFill,
    /// Minimum numerator/denominator ratio over a lookback, as a scalar
    #[display("MIN_RATIO_N_YEARS")]
    #[serde(rename = "MIN_RATIO_N_YEARS")]
    MinRatioNYears,
}

impl Operation {
    /// Parse an operation code such as `"-"` or `"cagr"`.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "+" => Some(Self::Add),
            "-" => Some(Self::Subtract),
            "*" => Some(Self::Multiply),
            "/" => Some(Self::Divide),
            "CAGR" => Some(Self::Cagr),
            "AVERAGE_PRIOR" => Some(Self::AveragePrior),
            "CONSOLIDATE_FILL" => Some(Self::ConsolidateFill),
            "MIN_RATIO_N_YEARS" => Some(Self::MinRatioNYears),
            _ => None,
        }
    }

    /// Whether this is one of the four arithmetic operators.
    #[must_use]
    pub const fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide
        )
    }

    /// Whether this operation yields a year-invariant scalar instead of a series.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        matches!(self, Self::MinRatioNYears)
    }

    /// Whether a rule may name itself as a component.
    ///
    /// Only a fill reads back the same result from its own output, so only a
    /// fill stays stable when the store is evaluated again.
    #[must_use]
    pub const fn allows_self_reference(&self) -> bool {
        matches!(self, Self::ConsolidateFill)
    }

    /// Lookback used when a rule does not set `years`, for operations that take one.
    #[must_use]
    pub const fn default_lookback(&self) -> Option<usize> {
        match self {
            Self::Cagr => Some(DEFAULT_CAGR_YEARS),
            Self::MinRatioNYears => Some(DEFAULT_MIN_RATIO_YEARS),
            _ => None,
        }
    }

    fn check_components(self, components: &[Component]) -> std::result::Result<(), String> {
        if components.is_empty() {
            return Err("no components".to_string());
        }
        if !self.is_arithmetic() && components.iter().any(Component::is_literal) {
            return Err(format!("{self} does not accept literal components"));
        }
        let expected = match self {
            Self::Cagr | Self::AveragePrior => Some(1),
            Self::MinRatioNYears => Some(2),
            _ => None,
        };
        match expected {
            Some(n) if components.len() != n => Err(format!(
                "{self} takes exactly {n} component(s), got {}",
                components.len()
            )),
            None if self.is_arithmetic() && components.len() < 2 => Err(format!(
                "{self} needs at least two components, got {}",
                components.len()
            )),
            _ => Ok(()),
        }
    }
}

/// A rule as written in a configuration table.
///
/// `operation` and `years` stay loosely typed so that one malformed rule can be
/// skipped without failing the whole table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Inputs, in positional order
    #[serde(default)]
    pub components: Vec<Component>,
    /// Operation code
    pub operation: String,
    /// Lookback in years (integer or digit string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<Value>,
    /// Scale applied to the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    /// Express the result in percentage points
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub percentage: bool,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Registry category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<RuleCategory>,
}

fn parse_lookback(value: &Value) -> std::result::Result<usize, String> {
    let years = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                trimmed.parse::<u64>().ok()
            } else {
                None
            }
        }
        _ => None,
    };
    match years.and_then(|y| usize::try_from(y).ok()) {
        Some(0) => Err("lookback years must be positive".to_string()),
        Some(y) => Ok(y),
        None => Err(format!("non-numeric lookback years {value}")),
    }
}

/// A validated equation rule.
#[derive(Debug, Clone, PartialEq)]
pub struct EquationRule {
    name: String,
    components: Vec<Component>,
    operation: Operation,
    lookback: Option<usize>,
    multiplier: f64,
    percentage: bool,
    description: Option<String>,
    category: Option<RuleCategory>,
}

impl EquationRule {
    /// Build a rule with a multiplier of 1 and the operation's default lookback.
    ///
    /// Component arity is not checked here; use [`EquationRule::from_definition`]
    /// for untrusted input.
    pub fn new(
        name: impl Into<String>,
        operation: Operation,
        components: impl IntoIterator<Item = Component>,
    ) -> Self {
        Self {
            name: name.into(),
            components: components.into_iter().collect(),
            operation,
            lookback: operation.default_lookback(),
            multiplier: 1.0,
            percentage: false,
            description: None,
            category: None,
        }
    }

    /// Validate a configuration entry.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::InvalidRule`] for an unknown operation, a
    /// non-numeric or zero lookback, a non-finite multiplier, an empty
    /// component name, the wrong number of components, or a component naming
    /// the rule itself outside `CONSOLIDATE_FILL`.
    pub fn from_definition(name: impl Into<String>, definition: &RuleDefinition) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: String| MetricaError::InvalidRule {
            rule: name.clone(),
            reason,
        };

        let operation = Operation::from_code(&definition.operation)
            .ok_or_else(|| invalid(format!("unknown operation '{}'", definition.operation)))?;

        operation
            .check_components(&definition.components)
            .map_err(&invalid)?;
        if definition
            .components
            .iter()
            .any(|c| c.metric_name().is_some_and(|n| n.trim().is_empty()))
        {
            return Err(invalid("empty component name".to_string()));
        }
        if !operation.allows_self_reference()
            && definition.components.iter().any(|c| c.metric_name() == Some(name.as_str()))
        {
            return Err(invalid(format!("{operation} cannot read its own output")));
        }

        let lookback = match (operation.default_lookback(), &definition.years) {
            (Some(_), Some(years)) => Some(parse_lookback(years).map_err(&invalid)?),
            (default, _) => default,
        };

        let multiplier = definition.multiplier.unwrap_or(1.0);
        if !multiplier.is_finite() {
            return Err(invalid(format!("multiplier {multiplier} is not finite")));
        }

        Ok(Self {
            components: definition.components.clone(),
            operation,
            lookback,
            multiplier,
            percentage: definition.percentage,
            description: definition.description.clone(),
            category: definition.category,
            name,
        })
    }

    /// Set the lookback window.
    #[must_use]
    pub const fn with_lookback(mut self, years: usize) -> Self {
        self.lookback = Some(years);
        self
    }

    /// Set the multiplier.
    #[must_use]
    pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Express the result in percentage points.
    #[must_use]
    pub const fn as_percentage(mut self) -> Self {
        self.percentage = true;
        self
    }

    /// Attach a description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a registry category.
    #[must_use]
    pub const fn in_category(mut self, category: RuleCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Name of the metric this rule produces.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Components in positional order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Operation kind.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Lookback window, for operations that take one.
    #[must_use]
    pub const fn lookback(&self) -> Option<usize> {
        self.lookback
    }

    /// Description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Registry category, if any.
    #[must_use]
    pub const fn category(&self) -> Option<RuleCategory> {
        self.category
    }

    /// Factor applied to every result value: the multiplier, times 100 for
    /// percentage rules.
    #[must_use]
    pub fn scale(&self) -> f64 {
        if self.percentage {
            self.multiplier * 100.0
        } else {
            self.multiplier
        }
    }

    /// Names of every metric component, in order, repeats included.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.iter().filter_map(Component::metric_name)
    }

    /// Convert back into the configuration shape.
    #[must_use]
    pub fn to_definition(&self) -> RuleDefinition {
        RuleDefinition {
            components: self.components.clone(),
            operation: self.operation.to_string(),
            years: self
                .lookback
                .filter(|_| self.operation.default_lookback().is_some())
                .map(Value::from),
            multiplier: (self.multiplier != 1.0).then_some(self.multiplier),
            percentage: self.percentage,
            description: self.description.clone(),
            category: self.category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn definition(value: Value) -> RuleDefinition {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_components_accept_names_and_literals() {
        let def = definition(json!({ "components": [1, "Tax Rate"], "operation": "-" }));
        assert_eq!(
            def.components,
            vec![Component::Literal(1.0), Component::from("Tax Rate")]
        );

        let rule = EquationRule::from_definition("Tax Retention Ratio", &def).unwrap();
        assert_eq!(rule.operation(), Operation::Subtract);
        assert_eq!(rule.dependencies().collect::<Vec<_>>(), vec!["Tax Rate"]);
    }

    #[rstest]
    #[case("+", Operation::Add)]
    #[case("/", Operation::Divide)]
    #[case("cagr", Operation::Cagr)]
    #[case(" AVERAGE_PRIOR ", Operation::AveragePrior)]
    #[case("CONSOLIDATE_FILL", Operation::ConsolidateFill)]
    #[case("MIN_RATIO_N_YEARS", Operation::MinRatioNYears)]
    fn test_operation_codes(#[case] code: &str, #[case] expected: Operation) {
        assert_eq!(Operation::from_code(code), Some(expected));
    }

    #[rstest]
    #[case(json!(3), 3)]
    #[case(json!("5"), 5)]
    #[case(json!(" 2 "), 2)]
    #[case(json!(4.0), 4)]
    fn test_lookback_accepts_integers_and_digit_strings(
        #[case] years: Value,
        #[case] expected: usize,
    ) {
        let def = definition(json!({ "components": ["EPS"], "operation": "CAGR", "years": years }));
        let rule = EquationRule::from_definition("EPS CAGR", &def).unwrap();
        assert_eq!(rule.lookback(), Some(expected));
    }

    #[test]
    fn test_lookback_defaults() {
        let cagr = definition(json!({ "components": ["Total Revenue"], "operation": "CAGR" }));
        let rule = EquationRule::from_definition("Revenue CAGR", &cagr).unwrap();
        assert_eq!(rule.lookback(), Some(DEFAULT_CAGR_YEARS));

        let min = definition(json!({
            "components": ["Cash", "Revenue"],
            "operation": "MIN_RATIO_N_YEARS"
        }));
        let rule = EquationRule::from_definition("Min Cash", &min).unwrap();
        assert_eq!(rule.lookback(), Some(DEFAULT_MIN_RATIO_YEARS));
    }

    #[rstest]
    #[case(json!({ "components": ["A", "B"], "operation": "%" }))]
    #[case(json!({ "components": ["A"], "operation": "CAGR", "years": "three" }))]
    #[case(json!({ "components": ["A"], "operation": "CAGR", "years": 0 }))]
    #[case(json!({ "components": ["A"], "operation": "CAGR", "years": -2 }))]
    #[case(json!({ "components": ["A"], "operation": "CAGR", "years": 2.5 }))]
    #[case(json!({ "components": [], "operation": "+" }))]
    #[case(json!({ "components": ["A"], "operation": "+" }))]
    #[case(json!({ "components": ["A", "B"], "operation": "CAGR" }))]
    #[case(json!({ "components": ["A"], "operation": "MIN_RATIO_N_YEARS" }))]
    #[case(json!({ "components": ["A", 2], "operation": "CONSOLIDATE_FILL" }))]
    #[case(json!({ "components": ["A", " "], "operation": "-" }))]
    #[case(json!({ "components": ["Broken", 1000], "operation": "*" }))]
    #[case(json!({ "components": ["Broken"], "operation": "AVERAGE_PRIOR" }))]
    fn test_malformed_definitions_are_rejected(#[case] value: Value) {
        let def = definition(value);
        let err = EquationRule::from_definition("Broken", &def).unwrap_err();
        assert!(matches!(err, MetricaError::InvalidRule { ref rule, .. } if rule == "Broken"));
    }

    #[test]
    fn test_fill_may_read_its_own_series() {
        let def = definition(json!({
            "components": ["Interest Expense", "Interest Expense Non-Operating"],
            "operation": "CONSOLIDATE_FILL"
        }));
        assert!(EquationRule::from_definition("Interest Expense", &def).is_ok());
    }

    #[test]
    fn test_years_ignored_for_operations_without_lookback() {
        let def = definition(json!({ "components": ["A", "B"], "operation": "-", "years": "n/a" }));
        let rule = EquationRule::from_definition("Diff", &def).unwrap();
        assert_eq!(rule.lookback(), None);
    }

    #[test]
    fn test_scale_combines_multiplier_and_percentage() {
        let rule = EquationRule::new("Margin", Operation::Divide, ["A".into(), "B".into()]);
        assert_eq!(rule.scale(), 1.0);
        assert_eq!(rule.clone().as_percentage().scale(), 100.0);
        assert_eq!(rule.with_multiplier(2.0).as_percentage().scale(), 200.0);
    }

    #[test]
    fn test_definition_shape_is_preserved() {
        let def = definition(json!({
            "components": ["Earnings Per Share (EPS)"],
            "operation": "CAGR",
            "years": 3,
            "multiplier": 100.0,
            "description": "EPS growth"
        }));
        let rule = EquationRule::from_definition("EPS CAGR", &def).unwrap();
        assert_eq!(rule.to_definition(), def);
    }
}
