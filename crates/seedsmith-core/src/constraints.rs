use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Set of columns whose combined values must be distinct across a model's rows.
///
/// Primary keys are represented as a unique constraint with `is_primary`
/// set. Column order is preserved because it defines the hash layout used
/// when checking for collisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UniqueConstraint {
    pub name: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub is_primary: bool,
}

impl UniqueConstraint {
    pub fn new(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(|field| field.to_string()).collect(),
            is_primary: false,
        }
    }

    pub fn primary(name: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            is_primary: true,
            ..Self::new(name, fields)
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|field| field == column)
    }
}
