//! Declarative plan documents for seedsmith.
//!
//! A `plan.json` names the models to seed, how many rows each target gets,
//! literal or templated field values, nested child plans, and the connect
//! policy. Documents are validated structurally (JSON Schema) and against a
//! [`SchemaGraph`](seedsmith_core::SchemaGraph) before the engine runs them.

pub mod errors;
pub mod model;
pub mod schema;
pub mod validate;

pub use errors::{IssueSeverity, PlanError, Result, ValidationIssue, ValidationReport};
pub use model::{
    ChildRule, ConnectRule, Count, FieldEntry, FieldRule, ModelRules, ParentRule, PlanDocument,
    RowsRule, Target,
};
pub use schema::{plan_json_schema, plan_json_schema_value};
pub use validate::{ValidatedPlan, validate_plan, validate_plan_against_graph, validate_plan_json};

/// Current contract version for `plan.json` artifacts.
pub const PLAN_VERSION: &str = "0.1";
