use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::errors::Result;
use crate::model::PlanDocument;

/// Emit the JSON Schema for `plan.json`.
pub fn plan_json_schema() -> RootSchema {
    schema_for!(PlanDocument)
}

/// JSON Schema for `plan.json` as a JSON value, ready for structural validation.
pub fn plan_json_schema_value() -> Result<serde_json::Value> {
    Ok(serde_json::to_value(plan_json_schema())?)
}
