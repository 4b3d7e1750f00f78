use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use seedsmith_core::{SchemaGraph, Sequence};

use crate::config::EngineConfig;
use crate::engine::PlanRun;
use crate::errors::Result;
use crate::input::{GenerateOptions, Input, UserModels};
use crate::report::GenerationReport;
use crate::resolver::UniqueIndex;
use crate::seed::SeedPath;
use crate::store::ValueStore;
use crate::templates::{SeededTemplates, ValueTemplates};
use crate::value::{GeneratedValue, Row};

/// Next value per `(model, field)` sequence.
#[derive(Debug, Default)]
pub(crate) struct SequenceRegistry {
    next: HashMap<(String, String), i64>,
}

impl SequenceRegistry {
    pub(crate) fn next_value(&mut self, model: &str, field: &str, sequence: &Sequence) -> i64 {
        let slot = self
            .next
            .entry((model.to_string(), field.to_string()))
            .or_insert(sequence.start);
        let value = *slot;
        *slot += sequence.increment;
        value
    }

    /// Move past a value that was written without drawing from the sequence.
    pub(crate) fn observe(&mut self, model: &str, field: &str, sequence: &Sequence, value: i64) {
        let slot = self
            .next
            .entry((model.to_string(), field.to_string()))
            .or_insert(sequence.start);
        let after = value + sequence.increment;
        let ahead = if sequence.increment >= 0 {
            after > *slot
        } else {
            after < *slot
        };
        if ahead {
            *slot = after;
        }
    }

    /// Continue right after `last_value`, like `setval`.
    pub(crate) fn set_last(&mut self, model: &str, field: &str, sequence: &Sequence, last_value: i64) {
        self.next.insert(
            (model.to_string(), field.to_string()),
            last_value + sequence.increment,
        );
    }

    pub(crate) fn clear(&mut self) {
        self.next.clear();
    }
}

/// Session-wide mutable state shared by every call.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) global: ValueStore,
    pub(crate) unique: UniqueIndex,
    pub(crate) sequences: SequenceRegistry,
    calls: HashMap<String, usize>,
}

impl SessionState {
    fn next_call(&mut self, model: &str) -> usize {
        let slot = self.calls.entry(model.to_string()).or_insert(0);
        let call = *slot;
        *slot += 1;
        call
    }

    fn clear(&mut self) {
        self.global.clear();
        self.unique.clear();
        self.sequences.clear();
        self.calls.clear();
    }
}

/// Rows and bookkeeping produced by one call.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Top-level rows, in order.
    pub rows: Vec<Row>,
    /// Every row the call produced, including parents and children.
    pub store: ValueStore,
    pub report: GenerationReport,
}

/// Long-lived generation client.
///
/// A session owns the rows generated or imported so far, the unique tuples
/// already taken and the sequence positions, so consecutive calls build on
/// each other.
pub struct Session {
    graph: Arc<SchemaGraph>,
    config: EngineConfig,
    templates: Option<Arc<dyn ValueTemplates>>,
    client_models: UserModels,
    state: SessionState,
}

impl Session {
    pub fn new(graph: impl Into<Arc<SchemaGraph>>) -> Self {
        Self {
            graph: graph.into(),
            config: EngineConfig::default(),
            templates: None,
            client_models: UserModels::default(),
            state: SessionState::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default value source for fields without overrides.
    pub fn with_templates<T>(mut self, templates: T) -> Self
    where
        T: ValueTemplates + 'static,
    {
        self.templates = Some(Arc::new(templates));
        self
    }

    /// Field overrides applied to every call made through this session.
    pub fn with_models(mut self, models: UserModels) -> Self {
        self.client_models = models;
        self
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rows generated or imported over the session's lifetime.
    pub fn store(&self) -> &ValueStore {
        &self.state.global
    }

    /// Generate rows for `model` and return the top-level ones.
    pub async fn generate(
        &mut self,
        model: &str,
        input: Input,
        options: GenerateOptions,
    ) -> Result<Vec<Row>> {
        Ok(self.run(model, input, options).await?.rows)
    }

    /// Generate rows for `model`, returning everything the call produced.
    pub async fn run(
        &mut self,
        model: &str,
        input: Input,
        options: GenerateOptions,
    ) -> Result<GenerationOutcome> {
        let start = Instant::now();
        self.graph.require_model(model)?;
        check_models(&self.graph, &self.client_models)?;
        check_models(&self.graph, &options.models)?;

        let seed = options
            .seed
            .clone()
            .unwrap_or_else(|| self.config.default_seed.clone());
        let call = self.state.next_call(model);
        let run_id = uuid::Uuid::new_v4().to_string();
        let templates = self.templates.clone().unwrap_or_else(|| {
            Arc::new(SeededTemplates::new(self.config.base_date)) as Arc<dyn ValueTemplates>
        });

        info!(run_id = %run_id, model, seed = %seed, call, "generation started");

        let report = GenerationReport::new(run_id.clone(), model, &seed);
        let mut run = PlanRun::new(
            Arc::clone(&self.graph),
            &self.config,
            templates,
            &self.client_models,
            &options,
            seed,
            &mut self.state,
            report,
        );
        let base = SeedPath::root().index(call).model(model);
        let result = run.generate_model(model, &input, base, &[]).await;
        let (store, mut report) = run.into_parts();
        report.duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(rows) => {
                info!(
                    run_id = %run_id,
                    model,
                    rows = report.rows_total,
                    connects = report.connects_total,
                    repairs = report.repairs_total,
                    duration_ms = report.duration_ms,
                    "generation completed"
                );
                Ok(GenerationOutcome {
                    rows,
                    store,
                    report,
                })
            }
            Err(err) => {
                warn!(run_id = %run_id, model, error = %err, "generation failed");
                Err(err)
            }
        }
    }

    /// Register rows that already exist in the target database.
    ///
    /// Imported rows become connect candidates, their unique tuples count as
    /// taken and sequences move past their values.
    pub fn import_rows(&mut self, model: &str, rows: impl IntoIterator<Item = Row>) -> Result<usize> {
        let graph = Arc::clone(&self.graph);
        let model = graph.require_model(model)?;
        let rows: Vec<Row> = rows.into_iter().collect();

        for row in &rows {
            if let Some(column) = row.columns().find(|column| model.scalar(column).is_none()) {
                return Err(seedsmith_core::Error::UnknownField {
                    model: model.name.clone(),
                    field: column.to_string(),
                }
                .into());
            }
        }

        let imported = rows.len();
        for row in rows {
            self.state.unique.record(model, &row);
            for field in model.scalars() {
                if let (Some(sequence), Some(value)) = (
                    &field.sequence,
                    row.get(&field.name).and_then(GeneratedValue::as_i64),
                ) {
                    self.state
                        .sequences
                        .observe(&model.name, &field.name, sequence, value);
                }
            }
            self.state.global.add(&model.name, row);
        }

        info!(model = %model.name, rows = imported, "imported existing rows");
        Ok(imported)
    }

    /// Continue a column's sequence right after `last_value`.
    pub fn sync_sequence(&mut self, model: &str, field: &str, last_value: i64) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        let model = graph.require_model(model)?;
        let sequence = model
            .scalar(field)
            .and_then(|scalar| scalar.sequence.as_ref())
            .ok_or_else(|| seedsmith_core::Error::UnknownField {
                model: model.name.clone(),
                field: field.to_string(),
            })?;
        self.state
            .sequences
            .set_last(&model.name, field, sequence, last_value);
        Ok(())
    }

    /// Forget every generated or imported row, taken tuple, sequence position
    /// and call counter, as after truncating the target database.
    pub fn reset(&mut self) {
        self.state.clear();
        info!("session reset");
    }
}

fn check_models(graph: &SchemaGraph, models: &UserModels) -> Result<()> {
    for (name, spec) in models.iter() {
        let model = graph.require_model(name)?;
        if let Some(field) = spec.fields().find(|field| model.scalar(field).is_none()) {
            return Err(seedsmith_core::Error::UnknownField {
                model: name.to_string(),
                field: field.to_string(),
            }
            .into());
        }
    }
    Ok(())
}
