use std::collections::HashSet;

use jsonschema::JSONSchema;
use seedsmith_core::{Field, Model, SchemaGraph};
use serde_json::Value;

use crate::errors::{PlanError, ValidationIssue, ValidationReport};
use crate::model::{ConnectRule, Count, FieldEntry, FieldRule, PlanDocument, RowsRule};

/// Validated plan with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: PlanDocument,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a plan JSON document against the plan JSON Schema.
pub fn validate_plan_json(
    plan_json: &Value,
    plan_schema: &Value,
) -> Result<ValidationReport, PlanError> {
    let compiled =
        JSONSchema::compile(plan_schema).map_err(|err| PlanError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(plan_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push(ValidationIssue::error(
                "schema_violation",
                path,
                error.to_string(),
            ));
        }
    }

    Ok(report)
}

/// Validate a parsed plan against a schema graph.
pub fn validate_plan_against_graph(plan: &PlanDocument, graph: &SchemaGraph) -> ValidationReport {
    let mut report = ValidationReport::default();

    if plan.plan_version != crate::PLAN_VERSION {
        report.push(
            ValidationIssue::warning(
                "plan_version_mismatch",
                "/plan_version",
                format!(
                    "plan_version '{}' differs from supported '{}'",
                    plan.plan_version,
                    crate::PLAN_VERSION
                ),
            )
            .with_hint("regenerate the plan against the current contract"),
        );
    }

    if plan.targets.is_empty() {
        report.push(
            ValidationIssue::error("targets_empty", "/targets", "plan requires at least one target")
                .with_hint("add at least one target model"),
        );
    }

    for (idx, target) in plan.targets.iter().enumerate() {
        let base_path = format!("/targets/{idx}");
        match graph.model(&target.model) {
            Some(model) => validate_rows(&target.rows, model, graph, &base_path, &mut report),
            None => report.push(ValidationIssue::error(
                "unknown_model",
                format!("{base_path}/model"),
                format!("model '{}' not found in graph", target.model),
            )),
        }
    }

    for (name, rules) in &plan.models {
        let base_path = format!("/models/{name}");
        match graph.model(name) {
            Some(model) => validate_entries(&rules.data, model, &format!("{base_path}/data"), &mut report),
            None => report.push(ValidationIssue::error(
                "unknown_model",
                base_path,
                format!("model '{name}' not found in graph"),
            )),
        }
    }

    if let Some(ConnectRule::Candidates(candidates)) = &plan.connect {
        for (name, rows) in candidates {
            let base_path = format!("/connect/{name}");
            let Some(model) = graph.model(name) else {
                report.push(ValidationIssue::error(
                    "unknown_model",
                    base_path,
                    format!("connect candidates reference unknown model '{name}'"),
                ));
                continue;
            };
            if rows.is_empty() {
                report.push(ValidationIssue::warning(
                    "connect_candidates_empty",
                    base_path.clone(),
                    format!("no connect candidates listed for '{name}'"),
                ));
            }
            for (row_idx, row) in rows.iter().enumerate() {
                for column in row.keys() {
                    if model.scalar(column).is_none() {
                        report.push(ValidationIssue::error(
                            "unknown_column",
                            format!("{base_path}/{row_idx}/{column}"),
                            format!("column '{}.{}' not found in graph", model.name, column),
                        ));
                    }
                }
            }
        }
    }

    report
}

/// Validate the plan end-to-end, returning structured issues on failure.
pub fn validate_plan(
    plan_json: &Value,
    plan_schema: &Value,
    graph: &SchemaGraph,
) -> Result<ValidatedPlan, ValidationReport> {
    let structural = match validate_plan_json(plan_json, plan_schema) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error(
                "schema_validation_error",
                "/",
                err.to_string(),
            ));
            return Err(report);
        }
    };

    if !structural.is_ok() {
        return Err(structural);
    }

    let plan = match PlanDocument::from_json(plan_json.clone()) {
        Ok(plan) => plan,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error("invalid_plan_json", "/", err.to_string()));
            return Err(report);
        }
    };

    let graph_report = validate_plan_against_graph(&plan, graph);
    if !graph_report.is_ok() {
        return Err(graph_report);
    }

    Ok(ValidatedPlan {
        plan,
        warnings: graph_report.warnings,
    })
}

fn validate_rows(
    rows: &RowsRule,
    model: &Model,
    graph: &SchemaGraph,
    base_path: &str,
    report: &mut ValidationReport,
) {
    if let Count::Range { min, max } = rows.count
        && min > max
    {
        report.push(
            ValidationIssue::error(
                "invalid_count_range",
                format!("{base_path}/count"),
                format!("count range min {min} is greater than max {max}"),
            )
            .with_hint("swap min and max or use a fixed count"),
        );
    }

    validate_entries(&rows.data, model, &format!("{base_path}/data"), report);

    for (idx, parent) in rows.parents.iter().enumerate() {
        let path = format!("{base_path}/parents/{idx}");
        match model.field(&parent.field) {
            Some(Field::Parent(relation)) => match graph.model(&relation.model) {
                Some(parent_model) => {
                    validate_entries(&parent.data, parent_model, &format!("{path}/data"), report)
                }
                None => report.push(ValidationIssue::error(
                    "unknown_model",
                    format!("{path}/field"),
                    format!("relation target '{}' not found in graph", relation.model),
                )),
            },
            _ => report.push(ValidationIssue::error(
                "not_a_parent_relation",
                format!("{path}/field"),
                format!("'{}.{}' is not a parent relation", model.name, parent.field),
            )),
        }
    }

    for (idx, child) in rows.children.iter().enumerate() {
        let path = format!("{base_path}/children/{idx}");
        match model.field(&child.field) {
            Some(Field::Child(relation)) => match graph.model(&relation.model) {
                Some(child_model) => validate_rows(&child.rows, child_model, graph, &path, report),
                None => report.push(ValidationIssue::error(
                    "unknown_model",
                    format!("{path}/field"),
                    format!("relation source '{}' not found in graph", relation.model),
                )),
            },
            _ => report.push(ValidationIssue::error(
                "not_a_child_relation",
                format!("{path}/field"),
                format!("'{}.{}' is not a child relation", model.name, child.field),
            )),
        }
    }
}

fn validate_entries(
    entries: &[FieldEntry],
    model: &Model,
    base_path: &str,
    report: &mut ValidationReport,
) {
    let mut seen = HashSet::new();

    for (idx, entry) in entries.iter().enumerate() {
        let path = format!("{base_path}/{idx}");

        let Some(field) = model.scalar(&entry.field) else {
            report.push(ValidationIssue::error(
                "unknown_column",
                format!("{path}/field"),
                format!("column '{}.{}' not found in graph", model.name, entry.field),
            ));
            continue;
        };

        if !seen.insert(entry.field.as_str()) {
            report.push(
                ValidationIssue::error(
                    "duplicate_field_rule",
                    path.clone(),
                    format!("multiple rules for '{}.{}'", model.name, entry.field),
                )
                .with_hint("keep only one rule per field"),
            );
        }

        if field.is_generated {
            report.push(ValidationIssue::warning(
                "overrides_generated_column",
                format!("{path}/field"),
                format!(
                    "'{}.{}' is computed by the database; the plan value will be inserted explicitly",
                    model.name, entry.field
                ),
            ));
        }

        match &entry.rule {
            FieldRule::OneOf { one_of } if one_of.is_empty() => {
                report.push(ValidationIssue::error(
                    "one_of_empty",
                    format!("{path}/rule/one_of"),
                    "one_of requires at least one value",
                ));
            }
            FieldRule::Pattern { pattern } if pattern.is_empty() => {
                report.push(ValidationIssue::error(
                    "pattern_empty",
                    format!("{path}/rule/pattern"),
                    "pattern must be a non-empty string",
                ));
            }
            FieldRule::Literal(Value::Null) if field.is_required => {
                report.push(ValidationIssue::error(
                    "null_for_required",
                    format!("{path}/rule"),
                    format!("'{}.{}' is required and cannot be null", model.name, entry.field),
                ));
            }
            _ => {}
        }
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
