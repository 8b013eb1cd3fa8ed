//! Equation tables and evaluation order.

use crate::registry::available_rules;
use crate::rule::{EquationRule, RuleDefinition};
use indexmap::IndexMap;
use metrica_types::{MetricaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// How a table decides evaluation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingPolicy {
    /// Sort rules by their references to other rules, keeping declaration
    /// order between independent rules. Cycles are rejected.
    #[default]
    Topological,
    /// Keep declaration order and reject any reference to a later rule.
    Declared,
}

/// A rule dropped at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    /// Rule name
    pub name: String,
    /// Why it was dropped
    pub reason: String,
}

#[derive(Deserialize)]
struct NamedDefinition {
    name: String,
    #[serde(flatten)]
    definition: RuleDefinition,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableRepr {
    Keyed(IndexMap<String, RuleDefinition>),
    Listed(Vec<NamedDefinition>),
}

/// An ordered, validated set of equation rules.
///
/// Tables are read-only once built and are shared between evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct EquationTable {
    rules: Vec<EquationRule>,
    skipped: Vec<SkippedRule>,
    policy: OrderingPolicy,
}

impl Default for EquationTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl EquationTable {
    /// The built-in valuation rule set.
    ///
    /// Its rules are declared dependencies-first, so declaration order is
    /// already a valid evaluation order.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            rules: available_rules(),
            skipped: Vec::new(),
            policy: OrderingPolicy::Declared,
        }
    }

    /// Order validated rules under `policy`.
    ///
    /// A later rule with the same name as an earlier one replaces it in place.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::InvalidRule`] for a rule other than a fill that
    /// names itself, [`MetricaError::DependencyCycle`] under
    /// [`OrderingPolicy::Topological`] and [`MetricaError::ForwardReference`]
    /// under [`OrderingPolicy::Declared`].
    pub fn from_rules(
        rules: impl IntoIterator<Item = EquationRule>,
        policy: OrderingPolicy,
    ) -> Result<Self> {
        let mut by_name: IndexMap<String, EquationRule> = IndexMap::new();
        for rule in rules {
            by_name.insert(rule.name().to_string(), rule);
        }
        let declared: Vec<EquationRule> = by_name.into_values().collect();
        check_self_references(&declared)?;

        let rules = match policy {
            OrderingPolicy::Topological => topological_order(declared)?,
            OrderingPolicy::Declared => {
                check_declared_order(&declared)?;
                declared
            }
        };

        Ok(Self {
            rules,
            skipped: Vec::new(),
            policy,
        })
    }

    /// Validate and order raw definitions.
    ///
    /// Malformed definitions are skipped with a warning and recorded in
    /// [`EquationTable::skipped`]; they never fail the table.
    ///
    /// # Errors
    ///
    /// Returns an ordering error as [`EquationTable::from_rules`] does.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = (String, RuleDefinition)>,
        policy: OrderingPolicy,
    ) -> Result<Self> {
        let mut rules = Vec::new();
        let mut skipped = Vec::new();
        for (name, definition) in definitions {
            match EquationRule::from_definition(name.clone(), &definition) {
                Ok(rule) => rules.push(rule),
                Err(err) => {
                    tracing::warn!(rule = %name, error = %err, "skipping malformed equation rule");
                    skipped.push(SkippedRule {
                        name,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let mut table = Self::from_rules(rules, policy)?;
        table.skipped = skipped;
        Ok(table)
    }

    /// Load a table from JSON.
    ///
    /// Accepts an object mapping rule names to definitions (key order is
    /// declaration order) or an array of definitions each carrying a `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::InvalidRule`] if the JSON has neither shape,
    /// or an ordering error as [`EquationTable::from_rules`] does.
    pub fn from_json(json: &str, policy: OrderingPolicy) -> Result<Self> {
        let repr: TableRepr = serde_json::from_str(json).map_err(|e| MetricaError::InvalidRule {
            rule: "<table>".to_string(),
            reason: e.to_string(),
        })?;
        match repr {
            TableRepr::Keyed(map) => Self::from_definitions(map, policy),
            TableRepr::Listed(list) => Self::from_definitions(
                list.into_iter().map(|named| (named.name, named.definition)),
                policy,
            ),
        }
    }

    /// Serialize the rules, in evaluation order, as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let map: IndexMap<&str, RuleDefinition> = self
            .rules
            .iter()
            .map(|rule| (rule.name(), rule.to_definition()))
            .collect();
        Ok(serde_json::to_string_pretty(&map)?)
    }

    /// Fail fast if any rule references a name that is neither produced by a
    /// rule nor in `known`.
    ///
    /// A rule that names itself refers to the raw series of that name, so its
    /// own name must be in `known`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricaError::UnknownComponent`] for the first unresolvable
    /// reference.
    pub fn validate_bindings<I, S>(&self, known: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known: HashSet<String> = known.into_iter().map(|s| s.as_ref().to_string()).collect();
        let produced: HashSet<&str> = self.rules.iter().map(EquationRule::name).collect();

        for rule in &self.rules {
            for dep in rule.dependencies() {
                let resolvable = if dep == rule.name() {
                    known.contains(dep)
                } else {
                    produced.contains(dep) || known.contains(dep)
                };
                if !resolvable {
                    return Err(MetricaError::UnknownComponent {
                        rule: rule.name().to_string(),
                        component: dep.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &EquationRule> + '_ {
        self.rules.iter()
    }

    /// Look up a rule by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EquationRule> {
        self.rules.iter().find(|rule| rule.name() == name)
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.rules.iter().map(EquationRule::name)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Definitions dropped at load time.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedRule] {
        &self.skipped
    }

    /// Ordering policy the table was built with.
    #[must_use]
    pub const fn policy(&self) -> OrderingPolicy {
        self.policy
    }
}

/// Indices of the other rules each rule depends on. Self references are not
/// edges.
fn rule_edges(rules: &[EquationRule]) -> Vec<BTreeSet<usize>> {
    let index: HashMap<&str, usize> = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| (rule.name(), i))
        .collect();
    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            rule.dependencies()
                .filter_map(|dep| index.get(dep).copied())
                .filter(|j| *j != i)
                .collect()
        })
        .collect()
}

fn check_self_references(rules: &[EquationRule]) -> Result<()> {
    for rule in rules {
        let reads_itself = rule.dependencies().any(|d| d == rule.name());
        if reads_itself && !rule.operation().allows_self_reference() {
            return Err(MetricaError::InvalidRule {
                rule: rule.name().to_string(),
                reason: format!("{} cannot read its own output", rule.operation()),
            });
        }
    }
    Ok(())
}

fn check_declared_order(rules: &[EquationRule]) -> Result<()> {
    for (i, deps) in rule_edges(rules).iter().enumerate() {
        if let Some(later) = deps.iter().find(|j| **j > i) {
            return Err(MetricaError::ForwardReference {
                rule: rules[i].name().to_string(),
                component: rules[*later].name().to_string(),
            });
        }
    }
    Ok(())
}

fn topological_order(rules: Vec<EquationRule>) -> Result<Vec<EquationRule>> {
    let edges = rule_edges(&rules);
    let mut pending: Vec<usize> = edges.iter().map(BTreeSet::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); rules.len()];
    for (i, deps) in edges.iter().enumerate() {
        for dep in deps {
            dependents[*dep].push(i);
        }
    }

    // Lowest declaration index first keeps the sort stable.
    let mut ready: BTreeSet<usize> = (0..rules.len()).filter(|i| pending[*i] == 0).collect();
    let mut order = Vec::with_capacity(rules.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &j in &dependents[i] {
            pending[j] -= 1;
            if pending[j] == 0 {
                ready.insert(j);
            }
        }
    }

    if order.len() < rules.len() {
        let cycle = (0..rules.len())
            .filter(|i| pending[*i] > 0)
            .map(|i| rules[i].name().to_string())
            .collect();
        return Err(MetricaError::DependencyCycle(cycle));
    }

    let mut slots: Vec<Option<EquationRule>> = rules.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Component, Operation};

    fn rule(name: &str, operation: Operation, deps: &[&str]) -> EquationRule {
        EquationRule::new(name, operation, deps.iter().map(|d| Component::from(*d)))
    }

    #[test]
    fn test_topological_sort_is_stable() {
        let rules = vec![
            rule("Net Debt", Operation::Subtract, &["Interest Bearing Debt", "Cash"]),
            rule("Book Value", Operation::Subtract, &["Total Assets", "Total Liabilities"]),
            rule("Interest Bearing Debt", Operation::Add, &["STD", "LTD"]),
            rule("Price / Book", Operation::Divide, &["Market Cap", "Book Value"]),
        ];
        let table = EquationTable::from_rules(rules, OrderingPolicy::Topological).unwrap();
        assert_eq!(
            table.names().collect::<Vec<_>>(),
            vec!["Book Value", "Interest Bearing Debt", "Net Debt", "Price / Book"]
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let rules = vec![
            rule("A", Operation::Add, &["B", "x"]),
            rule("B", Operation::Add, &["A", "y"]),
            rule("C", Operation::Add, &["x", "y"]),
        ];
        let err = EquationTable::from_rules(rules, OrderingPolicy::Topological).unwrap_err();
        match err {
            MetricaError::DependencyCycle(names) => assert_eq!(names, vec!["A", "B"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_reference_is_not_a_cycle() {
        let rules = vec![rule(
            "Total Revenue",
            Operation::ConsolidateFill,
            &["Total Revenue", "Sales"],
        )];
        let table = EquationTable::from_rules(rules, OrderingPolicy::Topological).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.validate_bindings(["Total Revenue", "Sales"]).is_ok());
        assert!(table.validate_bindings(["Sales"]).is_err());
    }

    #[test]
    fn test_arithmetic_self_reference_is_rejected() {
        let rules = vec![EquationRule::new(
            "Revenue",
            Operation::Multiply,
            [Component::from("Revenue"), Component::Literal(1000.0)],
        )];
        let err = EquationTable::from_rules(rules, OrderingPolicy::Topological).unwrap_err();
        assert!(matches!(err, MetricaError::InvalidRule { ref rule, .. } if rule == "Revenue"));

        let json = r#"{
            "Revenue": { "components": ["Revenue", 1000], "operation": "*" },
            "Revenue Growth": { "components": ["Revenue"], "operation": "CAGR" }
        }"#;
        let table = EquationTable::from_json(json, OrderingPolicy::Topological).unwrap();
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["Revenue Growth"]);
        assert_eq!(table.skipped()[0].name, "Revenue");
    }

    #[test]
    fn test_declared_policy_rejects_forward_references() {
        let rules = vec![
            rule("Net Debt", Operation::Subtract, &["Interest Bearing Debt", "Cash"]),
            rule("Interest Bearing Debt", Operation::Add, &["STD", "LTD"]),
        ];
        let err = EquationTable::from_rules(rules, OrderingPolicy::Declared).unwrap_err();
        assert!(matches!(
            err,
            MetricaError::ForwardReference { ref rule, ref component }
                if rule == "Net Debt" && component == "Interest Bearing Debt"
        ));
    }

    #[test]
    fn test_from_json_skips_malformed_rules() {
        let json = r#"{
            "Free Cash Flow": { "components": ["CFO", "CapEx"], "operation": "-" },
            "Broken Growth": { "components": ["Revenue"], "operation": "CAGR", "years": "three" },
            "Mystery": { "components": ["A", "B"], "operation": "%" },
            "FCF Growth": { "components": ["Free Cash Flow"], "operation": "CAGR", "years": "2" }
        }"#;
        let table = EquationTable::from_json(json, OrderingPolicy::Topological).unwrap();
        assert_eq!(
            table.names().collect::<Vec<_>>(),
            vec!["Free Cash Flow", "FCF Growth"]
        );
        let skipped: Vec<_> = table.skipped().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(skipped, vec!["Broken Growth", "Mystery"]);
    }

    #[test]
    fn test_from_json_accepts_rule_lists() {
        let json = r#"[
            { "name": "Tax Retention Ratio", "components": [1, "Tax Rate"], "operation": "-" },
            { "name": "Tax Rate", "components": ["Tax", "EBT"], "operation": "/" }
        ]"#;
        let table = EquationTable::from_json(json, OrderingPolicy::Topological).unwrap();
        assert_eq!(
            table.names().collect::<Vec<_>>(),
            vec!["Tax Rate", "Tax Retention Ratio"]
        );

        let err = EquationTable::from_json(json, OrderingPolicy::Declared).unwrap_err();
        assert!(matches!(err, MetricaError::ForwardReference { .. }));
    }

    #[test]
    fn test_from_json_rejects_other_shapes() {
        let err = EquationTable::from_json("42", OrderingPolicy::Topological).unwrap_err();
        assert!(matches!(err, MetricaError::InvalidRule { .. }));
    }

    #[test]
    fn test_validate_bindings_reports_unknown_component() {
        let table = EquationTable::from_rules(
            vec![rule("Market Cap", Operation::Multiply, &["Closing Price (USD)", "Shares"])],
            OrderingPolicy::Topological,
        )
        .unwrap();
        let err = table.validate_bindings(["Shares"]).unwrap_err();
        let MetricaError::UnknownComponent { component, .. } = &err else {
            panic!("expected an unknown component, got {err:?}");
        };
        assert_eq!(component, "Closing Price (USD)");
    }

    #[test]
    fn test_defaults_order_matches_topological_sort() {
        let defaults = EquationTable::with_defaults();
        let rules = || defaults.iter().cloned();
        let sorted = EquationTable::from_rules(rules(), OrderingPolicy::Topological).unwrap();
        assert_eq!(
            sorted.names().collect::<Vec<_>>(),
            defaults.names().collect::<Vec<_>>()
        );
        assert!(EquationTable::from_rules(rules(), OrderingPolicy::Declared).is_ok());
    }

    #[test]
    fn test_table_json_reloads() {
        let defaults = EquationTable::with_defaults();
        let json = defaults.to_json().unwrap();
        let reloaded = EquationTable::from_json(&json, OrderingPolicy::Declared).unwrap();
        assert_eq!(reloaded, defaults);
    }
}
