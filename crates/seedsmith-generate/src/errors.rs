use std::fmt;

use thiserror::Error;

use crate::value::{GeneratedValue, Row};

/// Details of a unique constraint that could not be satisfied.
#[derive(Debug, Clone)]
pub struct ConstraintViolation {
    pub constraint: String,
    pub model: String,
    /// Constrained columns with the values that collided.
    pub columns: Vec<(String, GeneratedValue)>,
    /// Seed of the row being generated.
    pub seed_path: String,
    pub row: Row,
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.columns.iter().map(|(name, _)| name.as_str()).collect();
        let values: Vec<String> = self
            .columns
            .iter()
            .map(|(_, value)| match value {
                GeneratedValue::Null => "null".to_string(),
                other => other.to_text(),
            })
            .collect();
        let row = serde_json::to_string(&self.row).unwrap_or_default();
        write!(
            f,
            "unique constraint '{}' on '{}' cannot be satisfied: ({}) = ({}) already exists; \
             seed path '{}'; row {}",
            self.constraint,
            self.model,
            names.join(", "),
            values.join(", "),
            self.seed_path,
            row
        )
    }
}

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    UnrepairableConstraint(Box<ConstraintViolation>),
    #[error("cannot resolve relation '{model}.{field}': {reason}")]
    UnresolvableParent {
        model: String,
        field: String,
        reason: String,
    },
    #[error("cyclic dependency detected: {path}")]
    CyclicDependency { path: String },
    #[error("nesting deeper than {max_depth} levels at '{path}'")]
    DepthExceeded { max_depth: usize, path: String },
    #[error("generator failed: {0}")]
    Generator(String),
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error(transparent)]
    Schema(#[from] seedsmith_core::Error),
    #[error("plan error: {0}")]
    Plan(#[from] seedsmith_plan::PlanError),
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl GenerationError {
    /// Error for a user-supplied generator that cannot produce a value.
    pub fn generator(message: impl Into<String>) -> Self {
        GenerationError::Generator(message.into())
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
