//! Running declarative plan documents.
//!
//! A [`PlanDocument`] is lowered into the same [`Input`] and
//! [`GenerateOptions`] a programmatic caller would build, then each target
//! runs as its own session call.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use seedsmith_core::{Field, Model, ScalarField, SchemaGraph};
use seedsmith_plan::{
    ConnectRule, FieldEntry, FieldRule, PlanDocument, PlanError, RowsRule, plan_json_schema_value,
    validate_plan,
};

use crate::errors::{GenerationError, Result};
use crate::input::{ConnectPolicy, FieldContext, FieldGenerator, FieldOverride, GenerateOptions, Input, RowSpec, UserModels};
use crate::seed::{seed_u64, seeded_index};
use crate::session::{GenerationOutcome, Session};
use crate::value::{GeneratedValue, Row};

/// A plan document lowered to engine inputs.
#[derive(Debug, Clone)]
pub struct LoweredPlan {
    pub options: GenerateOptions,
    /// `(model, input)` per target, in plan order.
    pub targets: Vec<(String, Input)>,
}

/// Picks one of a fixed list of values from the field seed.
#[derive(Debug, Clone)]
pub struct OneOfGenerator {
    values: Vec<GeneratedValue>,
}

impl OneOfGenerator {
    pub fn new(values: Vec<GeneratedValue>) -> Self {
        Self { values }
    }
}

#[async_trait]
impl FieldGenerator for OneOfGenerator {
    async fn generate(&self, ctx: &FieldContext<'_>) -> Result<GeneratedValue> {
        if self.values.is_empty() {
            return Err(GenerationError::generator(format!(
                "no values to choose from for '{}.{}'",
                ctx.model, ctx.field
            )));
        }
        Ok(self.values[seeded_index(ctx.seed, self.values.len())].clone())
    }
}

/// Fills `{index}` with the row position and `{n}` with a seed-derived number.
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    pattern: String,
}

impl PatternGenerator {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

#[async_trait]
impl FieldGenerator for PatternGenerator {
    async fn generate(&self, ctx: &FieldContext<'_>) -> Result<GeneratedValue> {
        let text = self
            .pattern
            .replace("{index}", &ctx.index.to_string())
            .replace("{n}", &(seed_u64(ctx.seed) % 1_000_000).to_string());
        Ok(GeneratedValue::Text(text))
    }
}

/// Turn a parsed document into engine inputs.
pub fn lower_document(graph: &SchemaGraph, plan: &PlanDocument) -> Result<LoweredPlan> {
    let mut models = UserModels::new();
    for (name, rules) in &plan.models {
        let model = graph.require_model(name)?;
        models = models.model(name.clone(), lower_entries(model, &rules.data)?);
    }

    let connect = match &plan.connect {
        None | Some(ConnectRule::All(false)) => None,
        Some(ConnectRule::All(true)) => Some(ConnectPolicy::All),
        Some(ConnectRule::Candidates(candidates)) => {
            let mut lowered = BTreeMap::new();
            for (name, rows) in candidates {
                let model = graph.require_model(name)?;
                let rows = rows
                    .iter()
                    .map(|row| lower_candidate(model, row))
                    .collect::<Result<Vec<Row>>>()?;
                lowered.insert(name.clone(), rows);
            }
            Some(ConnectPolicy::Candidates(lowered))
        }
    };

    let mut targets = Vec::with_capacity(plan.targets.len());
    for target in &plan.targets {
        let model = graph.require_model(&target.model)?;
        targets.push((target.model.clone(), lower_rows(graph, model, &target.rows)?));
    }

    Ok(LoweredPlan {
        options: GenerateOptions {
            seed: Some(plan.seed.clone()),
            models,
            connect,
        },
        targets,
    })
}

/// Run every target of a parsed document through `session`.
pub async fn run_document(session: &mut Session, plan: &PlanDocument) -> Result<Vec<GenerationOutcome>> {
    let lowered = lower_document(session.graph(), plan)?;
    let mut outcomes = Vec::with_capacity(lowered.targets.len());
    for (model, input) in lowered.targets {
        outcomes.push(session.run(&model, input, lowered.options.clone()).await?);
    }
    Ok(outcomes)
}

/// Validate a JSON plan against the contract and the session's graph, then run it.
pub async fn run_plan_json(session: &mut Session, plan_json: &Value) -> Result<Vec<GenerationOutcome>> {
    let schema = plan_json_schema_value()?;
    let validated = validate_plan(plan_json, &schema, session.graph())
        .map_err(|report| GenerationError::Plan(PlanError::Invalid(report)))?;
    for warning in &validated.warnings {
        tracing::warn!(code = %warning.code, path = %warning.path, "{}", warning.message);
    }
    run_document(session, &validated.plan).await
}

fn lower_rows(graph: &SchemaGraph, model: &Model, rows: &RowsRule) -> Result<Input> {
    let mut spec = lower_entries(model, &rows.data)?;

    for parent in &rows.parents {
        let Some(Field::Parent(relation)) = model.field(&parent.field) else {
            return Err(GenerationError::InvalidPlan(format!(
                "'{}.{}' is not a parent relation",
                model.name, parent.field
            )));
        };
        let parent_model = graph.require_model(&relation.model)?;
        spec.set(
            parent.field.clone(),
            FieldOverride::Parent(Box::new(lower_entries(parent_model, &parent.data)?)),
        );
    }

    for child in &rows.children {
        let Some(Field::Child(relation)) = model.field(&child.field) else {
            return Err(GenerationError::InvalidPlan(format!(
                "'{}.{}' is not a child relation",
                model.name, child.field
            )));
        };
        let child_model = graph.require_model(&relation.model)?;
        spec.set(
            child.field.clone(),
            FieldOverride::Children(lower_rows(graph, child_model, &child.rows)?),
        );
    }

    Ok(Input::repeat(rows.count, spec))
}

fn lower_entries(model: &Model, entries: &[FieldEntry]) -> Result<RowSpec> {
    let mut spec = RowSpec::new();
    for entry in entries {
        let field = scalar(model, &entry.field)?;
        spec.set(entry.field.clone(), lower_rule(field, &entry.rule));
    }
    Ok(spec)
}

fn lower_rule(field: &ScalarField, rule: &FieldRule) -> FieldOverride {
    match rule {
        FieldRule::Literal(value) => {
            FieldOverride::Literal(GeneratedValue::from_json(value, field.scalar_type))
        }
        FieldRule::OneOf { one_of } => {
            let values = one_of
                .iter()
                .map(|value| GeneratedValue::from_json(value, field.scalar_type))
                .collect();
            FieldOverride::Generator(Arc::new(OneOfGenerator::new(values)))
        }
        FieldRule::Pattern { pattern } => {
            FieldOverride::Generator(Arc::new(PatternGenerator::new(pattern.clone())))
        }
    }
}

fn lower_candidate(model: &Model, row: &BTreeMap<String, Value>) -> Result<Row> {
    row.iter()
        .map(|(column, value)| {
            let scalar_type = scalar(model, column)?.scalar_type;
            Ok((column.clone(), GeneratedValue::from_json(value, scalar_type)))
        })
        .collect()
}

fn scalar<'m>(model: &'m Model, column: &str) -> Result<&'m ScalarField> {
    model.scalar(column).ok_or_else(|| {
        seedsmith_core::Error::UnknownField {
            model: model.name.clone(),
            field: column.to_string(),
        }
        .into()
    })
}
