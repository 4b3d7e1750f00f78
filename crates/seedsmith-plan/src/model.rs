use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of rows to generate: a fixed count or an inclusive range resolved
/// deterministically from the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Count {
    Fixed(u64),
    Range { min: u64, max: u64 },
}

impl Default for Count {
    fn default() -> Self {
        Count::Fixed(1)
    }
}

/// How a single field gets its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldRule {
    /// Pick one of the listed values using the field seed.
    OneOf { one_of: Vec<Value> },
    /// Text with `{index}` (row index) and `{n}` (seed-derived number) placeholders.
    Pattern { pattern: String },
    /// Use the value as-is.
    Literal(Value),
}

/// Ordered field assignment; order decides generation position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldEntry {
    pub field: String,
    pub rule: FieldRule,
}

/// Row-level instructions shared by targets and nested child plans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RowsRule {
    #[serde(default)]
    pub count: Count,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<FieldEntry>,
    /// Overrides for parents generated on behalf of each row.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<ParentRule>,
    /// Child rows generated under each row.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildRule>,
}

/// Overrides for the single parent row generated through a `Parent` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParentRule {
    pub field: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<FieldEntry>,
}

/// Nested plan for a `Child` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChildRule {
    pub field: String,
    #[serde(flatten)]
    pub rows: RowsRule,
}

/// Top-level generation request for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Target {
    pub model: String,
    #[serde(flatten)]
    pub rows: RowsRule,
}

/// Per-model field rules applied to every row of that model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelRules {
    #[serde(default)]
    pub data: Vec<FieldEntry>,
}

/// Connect policy: `true` reuses any stored row, a table restricts candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ConnectRule {
    All(bool),
    Candidates(BTreeMap<String, Vec<BTreeMap<String, Value>>>),
}

/// Canonical plan definition for seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanDocument {
    /// Contract version for the plan format.
    pub plan_version: String,
    /// Root seed for reproducibility.
    pub seed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<ConnectRule>,
    /// Field rules per model name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub models: BTreeMap<String, ModelRules>,
    /// Targets generated in order, each as its own engine call.
    pub targets: Vec<Target>,
}

impl PlanDocument {
    pub fn from_json(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_targets() {
        let plan: PlanDocument = serde_json::from_value(json!({
            "plan_version": "0.1",
            "seed": "league",
            "targets": [{
                "model": "Team",
                "count": 2,
                "data": [{"field": "name", "rule": {"pattern": "team-{index}"}}],
                "children": [{"field": "players", "count": {"min": 1, "max": 3}}]
            }]
        }))
        .expect("parse plan");

        let target = &plan.targets[0];
        assert_eq!(target.rows.count, Count::Fixed(2));
        assert!(matches!(
            &target.rows.data[0].rule,
            FieldRule::Pattern { pattern } if pattern == "team-{index}"
        ));
        assert_eq!(
            target.rows.children[0].rows.count,
            Count::Range { min: 1, max: 3 }
        );
        assert!(plan.connect.is_none());
    }

    #[test]
    fn field_rules_prefer_structured_variants() {
        let one_of: FieldRule = serde_json::from_value(json!({"one_of": ["a", "b"]})).unwrap();
        assert!(matches!(one_of, FieldRule::OneOf { one_of } if one_of.len() == 2));

        let literal: FieldRule = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(literal, FieldRule::Literal(json!(42)));
    }

    #[test]
    fn connect_accepts_bool_or_candidates() {
        let all: ConnectRule = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(all, ConnectRule::All(true));

        let table: ConnectRule =
            serde_json::from_value(json!({"Organization": [{"id": 7}]})).unwrap();
        let ConnectRule::Candidates(candidates) = table else {
            panic!("expected candidate table");
        };
        assert_eq!(candidates["Organization"][0]["id"], json!(7));
    }
}
