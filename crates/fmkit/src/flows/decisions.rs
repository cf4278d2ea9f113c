use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A test applied to one input field of a decision table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equal {
        value: Value,
    },
    LessThan {
        value: f64,
    },
    GreaterThanOrEqual {
        value: f64,
    },
    InRange {
        low: f64,
        high: f64,
        low_inclusive: bool,
        high_inclusive: bool,
    },
}

impl Condition {
    pub fn equal(value: impl Into<Value>) -> Self {
        Condition::Equal {
            value: value.into(),
        }
    }

    pub fn less_than(value: f64) -> Self {
        Condition::LessThan { value }
    }

    pub fn greater_than_or_equal(value: f64) -> Self {
        Condition::GreaterThanOrEqual { value }
    }

    pub fn in_range(low: f64, high: f64, low_inclusive: bool, high_inclusive: bool) -> Self {
        Condition::InRange {
            low,
            high,
            low_inclusive,
            high_inclusive,
        }
    }

    pub fn matches(&self, actual: &Value) -> bool {
        match self {
            Condition::Equal { value } => match (value.as_f64(), actual.as_f64()) {
                (Some(expected), Some(actual)) => expected == actual,
                _ => value == actual,
            },
            Condition::LessThan { value } => actual.as_f64().is_some_and(|a| a < *value),
            Condition::GreaterThanOrEqual { value } => {
                actual.as_f64().is_some_and(|a| a >= *value)
            }
            Condition::InRange {
                low,
                high,
                low_inclusive,
                high_inclusive,
            } => actual.as_f64().is_some_and(|a| {
                let above = if *low_inclusive { a >= *low } else { a > *low };
                let below = if *high_inclusive { a <= *high } else { a < *high };
                above && below
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    #[serde(flatten)]
    pub condition: Condition,
}

/// Conditions that must all hold, and the outputs set when they do
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub conditions: Vec<FieldCondition>,
    pub actions: BTreeMap<String, Value>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push(FieldCondition {
            field: field.into(),
            condition,
        });
        self
    }

    pub fn action(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.actions.insert(field.into(), value.into());
        self
    }

    pub fn matches(&self, input: &Value) -> bool {
        self.conditions.iter().all(|c| {
            input
                .get(&c.field)
                .is_some_and(|actual| c.condition.matches(actual))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTable {
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub default_actions: BTreeMap<String, Value>,
}

impl DecisionTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            default_actions: BTreeMap::new(),
        }
    }

    pub fn with_default(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.default_actions.insert(field.into(), value.into());
        self
    }

    /// Actions of the first matching rule, or the defaults when none matches
    pub fn evaluate(&self, input: &Value) -> &BTreeMap<String, Value> {
        self.rules
            .iter()
            .find(|rule| rule.matches(input))
            .map(|rule| &rule.actions)
            .unwrap_or(&self.default_actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conditions() {
        assert!(Condition::equal("A").matches(&json!("A")));
        assert!(!Condition::equal("A").matches(&json!("B")));
        assert!(Condition::equal(100).matches(&json!(100.0)));
        assert!(Condition::less_than(10.0).matches(&json!(9.5)));
        assert!(!Condition::less_than(10.0).matches(&json!("9")));
        assert!(Condition::greater_than_or_equal(10.0).matches(&json!(10)));

        let range = Condition::in_range(100.0, 300.0, true, false);
        assert!(range.matches(&json!(100)));
        assert!(range.matches(&json!(299.99)));
        assert!(!range.matches(&json!(300)));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let table = DecisionTable::new(vec![
            Rule::new()
                .condition("grade", Condition::equal("A"))
                .action("insurance_required", false),
            Rule::new()
                .condition("grade", Condition::equal("A"))
                .action("insurance_required", true),
        ])
        .with_default("assessment_error", "Not assessed.");

        assert_eq!(
            table.evaluate(&json!({"grade": "A"}))["insurance_required"],
            json!(false)
        );
        assert_eq!(
            table.evaluate(&json!({"grade": "C"}))["assessment_error"],
            json!("Not assessed.")
        );
        assert_eq!(
            table.evaluate(&json!({}))["assessment_error"],
            json!("Not assessed.")
        );
    }

    #[test]
    fn test_serialized_shape() -> anyhow::Result<()> {
        let rule = Rule::new()
            .condition("loan_amount", Condition::in_range(1.0, 2.0, true, false))
            .action("insurance_rate", 0.001);
        let value = serde_json::to_value(&rule)?;

        assert_eq!(value["conditions"][0]["field"], "loan_amount");
        assert_eq!(value["conditions"][0]["op"], "in_range");
        assert_eq!(value["conditions"][0]["low_inclusive"], true);
        assert_eq!(value["actions"]["insurance_rate"], 0.001);
        Ok(())
    }
}
