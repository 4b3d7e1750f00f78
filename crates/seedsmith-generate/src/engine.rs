//! Plan execution: turns an [`Input`] into rows, recursing through parent
//! and child relations.
//!
//! For each row the engine resolves parents first, then identifying columns,
//! stores the partial row so nested generation can see it, fills the
//! remaining scalars, runs the constraint resolver and finally generates any
//! requested children with the row's key injected.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use seedsmith_core::{Model, RelationField, ScalarField, SchemaGraph, Sequence};

use crate::config::EngineConfig;
use crate::errors::{GenerationError, Result};
use crate::input::{
    ConnectContext, ConnectPolicy, FieldContext, FieldGenerator, FieldOverride, GenerateOptions,
    Input, RowContext, RowInput, RowSpec, UserModels,
};
use crate::report::GenerationReport;
use crate::resolver::ConstraintResolver;
use crate::seed::{SeedPath, derive_seed, field_seed, resolve_count, seeded_index};
use crate::session::SessionState;
use crate::store::ValueStore;
use crate::templates::ValueTemplates;
use crate::value::{GeneratedValue, Row};

/// Where a scalar field's value comes from.
pub(crate) enum ScalarSource<'a> {
    Literal(&'a GeneratedValue),
    Generator(&'a dyn FieldGenerator),
    Sequence(&'a Sequence),
    Template,
    /// Left for the database to fill.
    Database,
}

/// Everything needed to produce values for one row.
pub(crate) struct RowScope<'a> {
    pub(crate) model: &'a Model,
    pub(crate) spec: &'a RowSpec,
    pub(crate) call_models: &'a UserModels,
    pub(crate) client_models: &'a UserModels,
    pub(crate) templates: &'a dyn ValueTemplates,
    pub(crate) connect: Option<&'a ConnectPolicy>,
    pub(crate) plan_store: &'a ValueStore,
    pub(crate) global_store: &'a ValueStore,
    pub(crate) row_seed: &'a str,
    pub(crate) index: usize,
}

impl<'a> RowScope<'a> {
    /// Override for a field, looking at the row first, then call-level and
    /// session-level model overrides.
    pub(crate) fn field_override(&self, field: &str) -> Option<&'a FieldOverride> {
        let spec: &'a RowSpec = self.spec;
        let call_models: &'a UserModels = self.call_models;
        let client_models: &'a UserModels = self.client_models;
        spec.get(field)
            .or_else(|| call_models.field(&self.model.name, field))
            .or_else(|| client_models.field(&self.model.name, field))
    }

    pub(crate) fn scalar_source(&self, field: &'a ScalarField) -> Result<ScalarSource<'a>> {
        match self.field_override(&field.name) {
            Some(FieldOverride::Literal(value)) => Ok(ScalarSource::Literal(value)),
            Some(FieldOverride::Generator(generator)) => {
                Ok(ScalarSource::Generator(generator.as_ref()))
            }
            Some(other) => Err(GenerationError::InvalidPlan(format!(
                "'{}.{}' is a scalar field and cannot take a {} override",
                self.model.name,
                field.name,
                other.kind()
            ))),
            None if field.is_generated => Ok(ScalarSource::Database),
            None => match &field.sequence {
                Some(sequence) => Ok(ScalarSource::Sequence(sequence)),
                None if field.has_default_value && !field.is_id => Ok(ScalarSource::Database),
                None => Ok(ScalarSource::Template),
            },
        }
    }

    /// Rows a parent field may fall back to, when the call has a connect policy.
    pub(crate) fn connect_pool(&self, parent_model: &str) -> Option<&'a [Row]> {
        let global_store: &'a ValueStore = self.global_store;
        let rows: &'a [Row] = match self.connect? {
            ConnectPolicy::All => global_store.rows_of(parent_model),
            ConnectPolicy::Candidates(candidates) => candidates
                .get(parent_model)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        };
        (!rows.is_empty()).then_some(rows)
    }

    /// Produce a value from a literal, generator or template source.
    pub(crate) async fn invoke(
        &self,
        field: &ScalarField,
        source: &ScalarSource<'_>,
        seed: &str,
        row: &Row,
    ) -> Result<GeneratedValue> {
        let ctx = FieldContext {
            model: &self.model.name,
            field: &field.name,
            seed,
            index: self.index,
            row,
            plan_store: self.plan_store,
            global_store: self.global_store,
        };
        match source {
            ScalarSource::Literal(value) => Ok((*value).clone()),
            ScalarSource::Generator(generator) => generator.generate(&ctx).await,
            ScalarSource::Template => self.templates.generate(self.model, field, &ctx).await,
            ScalarSource::Sequence(_) | ScalarSource::Database => Err(GenerationError::InvalidPlan(
                format!("'{}.{}' has no value source", self.model.name, field.name),
            )),
        }
    }
}

enum ParentSource {
    Null,
    Existing(Row),
    Generate { spec: RowSpec, implicit: bool },
}

/// State of one top-level generation call.
pub(crate) struct PlanRun<'s> {
    graph: Arc<SchemaGraph>,
    config: &'s EngineConfig,
    templates: Arc<dyn ValueTemplates>,
    client_models: &'s UserModels,
    options: &'s GenerateOptions,
    root_seed: String,
    state: &'s mut SessionState,
    plan_store: ValueStore,
    report: GenerationReport,
    /// Parent fields currently being generated without user instructions.
    implicit_parents: Vec<(String, String)>,
    depth: usize,
}

impl<'s> PlanRun<'s> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        graph: Arc<SchemaGraph>,
        config: &'s EngineConfig,
        templates: Arc<dyn ValueTemplates>,
        client_models: &'s UserModels,
        options: &'s GenerateOptions,
        root_seed: String,
        state: &'s mut SessionState,
        report: GenerationReport,
    ) -> Self {
        Self {
            graph,
            config,
            templates,
            client_models,
            options,
            root_seed,
            state,
            plan_store: ValueStore::new(),
            report,
            implicit_parents: Vec::new(),
            depth: 0,
        }
    }

    pub(crate) fn into_parts(self) -> (ValueStore, GenerationReport) {
        (self.plan_store, self.report)
    }

    /// Generate every row `input` asks for under `base`.
    pub(crate) fn generate_model<'a>(
        &'a mut self,
        model_name: &'a str,
        input: &'a Input,
        base: SeedPath,
        inject: &'a [(String, GeneratedValue)],
    ) -> BoxFuture<'a, Result<Vec<Row>>> {
        Box::pin(async move {
            if self.depth > self.config.max_depth {
                return Err(GenerationError::DepthExceeded {
                    max_depth: self.config.max_depth,
                    path: derive_seed(&self.root_seed, &base),
                });
            }

            let graph = Arc::clone(&self.graph);
            let model = graph.require_model(model_name)?;
            let batch_seed = derive_seed(&self.root_seed, &base);
            let row_inputs: Vec<&RowInput> = match input {
                Input::Rows(rows) => rows.iter().collect(),
                Input::Count { count, row } => {
                    std::iter::repeat_n(row, resolve_count(count, &batch_seed)).collect()
                }
            };

            let mut rows = Vec::with_capacity(row_inputs.len());
            for (index, row_input) in row_inputs.into_iter().enumerate() {
                let row = self
                    .generate_row(model, row_input, index, base.index(index), inject)
                    .await?;
                rows.push(row);
            }
            Ok(rows)
        })
    }

    async fn generate_row(
        &mut self,
        model: &Model,
        row_input: &RowInput,
        index: usize,
        path: SeedPath,
        inject: &[(String, GeneratedValue)],
    ) -> Result<Row> {
        let row_seed = derive_seed(&self.root_seed, &path);
        let mut spec = match row_input {
            RowInput::Spec(spec) => spec.clone(),
            RowInput::Factory(factory) => factory(&RowContext {
                seed: &row_seed,
                index,
                plan_store: &self.plan_store,
                global_store: &self.state.global,
            })?,
        };
        for (column, value) in inject {
            spec.set(column.clone(), FieldOverride::Literal(value.clone()));
        }
        if let Some(unknown) = spec.fields().find(|name| model.field(name).is_none()) {
            return Err(seedsmith_core::Error::UnknownField {
                model: model.name.clone(),
                field: unknown.to_string(),
            }
            .into());
        }

        let mut row = Row::new();
        for parent in model.parents() {
            self.resolve_parent(model, parent, &spec, &mut row, &row_seed, index, &path)
                .await?;
        }

        let (ids, rest): (Vec<&ScalarField>, Vec<&ScalarField>) = self
            .field_order(model, &spec)
            .into_iter()
            .partition(|field| field.is_id);

        self.assign_scalars(model, &ids, &spec, &mut row, &row_seed, index)
            .await?;

        let plan_slot = self.plan_store.add(&model.name, row.clone());
        let global_slot = self.state.global.add(&model.name, row.clone());

        self.assign_scalars(model, &rest, &spec, &mut row, &row_seed, index)
            .await?;

        let repairs = {
            let scope = RowScope {
                model,
                spec: &spec,
                call_models: &self.options.models,
                client_models: self.client_models,
                templates: self.templates.as_ref(),
                connect: self.options.connect.as_ref(),
                plan_store: &self.plan_store,
                global_store: &self.state.global,
                row_seed: &row_seed,
                index,
            };
            ConstraintResolver::new(&mut self.state.unique, self.config.max_scalar_attempts)
                .resolve(&mut row, &scope)
                .await?
        };
        for _ in 0..repairs {
            self.report.record_repair(&model.name);
        }

        self.plan_store.replace(&model.name, plan_slot, row.clone());
        self.state.global.replace(&model.name, global_slot, row.clone());
        self.report.record_row(&model.name);

        self.generate_children(model, &spec, &row, &path).await?;
        Ok(row)
    }

    /// Scalars in schema order, with each override layer moving the fields it
    /// declares to the end in declaration order.
    fn field_order<'m>(&self, model: &'m Model, spec: &RowSpec) -> Vec<&'m ScalarField> {
        let mut order: Vec<&'m ScalarField> = model.scalars().collect();
        let layers = [
            self.client_models.get(&model.name),
            self.options.models.get(&model.name),
            Some(spec),
        ];
        for layer in layers.into_iter().flatten() {
            for name in layer.fields() {
                if let Some(position) = order.iter().position(|field| field.name == name) {
                    let field = order.remove(position);
                    order.push(field);
                }
            }
        }
        order
    }

    async fn assign_scalars(
        &mut self,
        model: &Model,
        fields: &[&ScalarField],
        spec: &RowSpec,
        row: &mut Row,
        row_seed: &str,
        index: usize,
    ) -> Result<()> {
        for &field in fields {
            if model.is_relation_column(&field.name) {
                continue;
            }
            let seed = field_seed(row_seed, &field.name);
            let scope = RowScope {
                model,
                spec,
                call_models: &self.options.models,
                client_models: self.client_models,
                templates: self.templates.as_ref(),
                connect: self.options.connect.as_ref(),
                plan_store: &self.plan_store,
                global_store: &self.state.global,
                row_seed,
                index,
            };
            let value = match scope.scalar_source(field)? {
                ScalarSource::Database => continue,
                ScalarSource::Sequence(sequence) => GeneratedValue::Int(
                    self.state
                        .sequences
                        .next_value(&model.name, &field.name, sequence),
                ),
                ScalarSource::Literal(value) => {
                    if let (Some(sequence), Some(number)) = (&field.sequence, value.as_i64()) {
                        self.state
                            .sequences
                            .observe(&model.name, &field.name, sequence, number);
                    }
                    value.clone()
                }
                source => scope.invoke(field, &source, &seed, row).await?,
            };
            row.set(field.name.clone(), value);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve_parent(
        &mut self,
        model: &Model,
        parent: &RelationField,
        spec: &RowSpec,
        row: &mut Row,
        row_seed: &str,
        index: usize,
        path: &SeedPath,
    ) -> Result<()> {
        let seed = field_seed(row_seed, &parent.name);
        let source = {
            let scope = RowScope {
                model,
                spec,
                call_models: &self.options.models,
                client_models: self.client_models,
                templates: self.templates.as_ref(),
                connect: self.options.connect.as_ref(),
                plan_store: &self.plan_store,
                global_store: &self.state.global,
                row_seed,
                index,
            };

            let (supplied, missing): (Vec<&String>, Vec<&String>) =
                parent.from_fields.iter().partition(|column| {
                    matches!(
                        scope.field_override(column),
                        Some(FieldOverride::Literal(_) | FieldOverride::Generator(_))
                    )
                });
            if !supplied.is_empty() && !missing.is_empty() {
                let missing: Vec<&str> = missing.iter().map(|column| column.as_str()).collect();
                return Err(GenerationError::InvalidPlan(format!(
                    "'{}.{}' supplies only part of its key; missing column(s): {}",
                    model.name,
                    parent.name,
                    missing.join(", ")
                )));
            }
            if !supplied.is_empty() {
                for column in &parent.from_fields {
                    let Some(field) = model.scalar(column) else {
                        continue;
                    };
                    let source = scope.scalar_source(field)?;
                    let value = scope
                        .invoke(field, &source, &field_seed(row_seed, column), row)
                        .await?;
                    row.set(column.clone(), value);
                }
                return Ok(());
            }

            match spec.get(&parent.name) {
                Some(FieldOverride::Connect(connect)) => {
                    let ctx = ConnectContext {
                        model: &parent.model,
                        seed: &seed,
                        index,
                        plan_store: &self.plan_store,
                        global_store: &self.state.global,
                    };
                    ParentSource::Existing(connect.connect(&ctx).await?)
                }
                Some(FieldOverride::Parent(nested)) => ParentSource::Generate {
                    spec: nested.as_ref().clone(),
                    implicit: false,
                },
                Some(other) => {
                    return Err(GenerationError::InvalidPlan(format!(
                        "'{}.{}' is a parent relation and cannot take a {} override",
                        model.name,
                        parent.name,
                        other.kind()
                    )));
                }
                None => match scope.connect_pool(&parent.model) {
                    Some(pool) => {
                        ParentSource::Existing(pool[seeded_index(&seed, pool.len())].clone())
                    }
                    None if !parent.is_required => ParentSource::Null,
                    None => ParentSource::Generate {
                        spec: RowSpec::new(),
                        implicit: true,
                    },
                },
            }
        };

        let parent_row = match source {
            ParentSource::Null => {
                for column in &parent.from_fields {
                    row.set(column.clone(), GeneratedValue::Null);
                }
                return Ok(());
            }
            ParentSource::Existing(parent_row) => {
                self.report.record_connect(&model.name);
                debug!(
                    model = %model.name,
                    field = %parent.name,
                    parent = %parent.model,
                    seed = %seed,
                    "connected existing parent"
                );
                parent_row
            }
            ParentSource::Generate { spec, implicit } => {
                self.generate_parent(model, parent, spec, implicit, path)
                    .await?
            }
        };

        for (from, to) in parent.from_fields.iter().zip(&parent.to_fields) {
            match parent_row.get(to) {
                Some(GeneratedValue::Null) | None if parent.is_required => {
                    return Err(GenerationError::UnresolvableParent {
                        model: model.name.clone(),
                        field: parent.name.clone(),
                        reason: format!(
                            "parent row has no value for '{}.{}'",
                            parent.model, to
                        ),
                    });
                }
                Some(value) => row.set(from.clone(), value.clone()),
                None => row.set(from.clone(), GeneratedValue::Null),
            }
        }
        Ok(())
    }

    async fn generate_parent(
        &mut self,
        model: &Model,
        parent: &RelationField,
        spec: RowSpec,
        implicit: bool,
        path: &SeedPath,
    ) -> Result<Row> {
        let key = (model.name.clone(), parent.name.clone());
        if implicit {
            if let Some(start) = self.implicit_parents.iter().position(|entry| *entry == key) {
                let chain: Vec<String> = self.implicit_parents[start..]
                    .iter()
                    .chain(std::iter::once(&key))
                    .map(|(model, field)| format!("{model}.{field}"))
                    .collect();
                return Err(GenerationError::CyclicDependency {
                    path: chain.join(" -> "),
                });
            }
            self.implicit_parents.push(key);
        }

        let input = Input::one(spec);
        self.depth += 1;
        let result = self
            .generate_model(&parent.model, &input, path.model(&parent.name), &[])
            .await;
        self.depth -= 1;
        if implicit {
            self.implicit_parents.pop();
        }

        result?
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::UnresolvableParent {
                model: model.name.clone(),
                field: parent.name.clone(),
                reason: "no parent row was generated".to_string(),
            })
    }

    async fn generate_children(
        &mut self,
        model: &Model,
        spec: &RowSpec,
        row: &Row,
        path: &SeedPath,
    ) -> Result<()> {
        for child in model.children() {
            // Self-relations are driven from the referencing side.
            if model
                .parents()
                .any(|parent| parent.relation_name == child.relation_name)
            {
                continue;
            }
            let Some(field_override) = spec.get(&child.name) else {
                continue;
            };
            let FieldOverride::Children(input) = field_override else {
                return Err(GenerationError::InvalidPlan(format!(
                    "'{}.{}' is a child relation and cannot take a {} override",
                    model.name,
                    child.name,
                    field_override.kind()
                )));
            };

            let mut inject = Vec::with_capacity(child.from_fields.len());
            for (from, to) in child.from_fields.iter().zip(&child.to_fields) {
                let value = row
                    .get(to)
                    .filter(|value| !value.is_null())
                    .cloned()
                    .ok_or_else(|| GenerationError::UnresolvableParent {
                        model: child.model.clone(),
                        field: child.name.clone(),
                        reason: format!("'{}.{}' has no value to reference", model.name, to),
                    })?;
                inject.push((from.clone(), value));
            }

            self.depth += 1;
            let result = self
                .generate_model(&child.model, input, path.model(&child.name), &inject)
                .await;
            self.depth -= 1;
            result?;
        }
        Ok(())
    }
}
