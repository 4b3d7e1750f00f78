use std::collections::HashMap;

use seedsmith_core::SchemaGraph;

use crate::value::Row;

/// Rows grouped by model, remembering the order they were generated in.
///
/// Rows are added as soon as their identifying columns exist and replaced
/// once the rest of the row is resolved, so a row is always stored before
/// any row that references it.
#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    rows: HashMap<String, Vec<Row>>,
    models: Vec<String>,
    generation_order: Vec<(String, usize)>,
}

/// Consecutive rows of one model that can be written together.
#[derive(Debug, Clone)]
pub struct RowBatch<'a> {
    pub model: &'a str,
    pub rows: Vec<&'a Row>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row and return its position within the model.
    pub fn add(&mut self, model: &str, row: Row) -> usize {
        if !self.rows.contains_key(model) {
            self.models.push(model.to_string());
        }
        let rows = self.rows.entry(model.to_string()).or_default();
        rows.push(row);
        let index = rows.len() - 1;
        self.generation_order.push((model.to_string(), index));
        index
    }

    /// Overwrite a previously added row.
    pub fn replace(&mut self, model: &str, index: usize, row: Row) {
        if let Some(slot) = self.rows.get_mut(model).and_then(|rows| rows.get_mut(index)) {
            *slot = row;
        }
    }

    pub fn rows_of(&self, model: &str) -> &[Row] {
        self.rows.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every model with rows, in first-insertion order.
    pub fn all_rows(&self) -> impl Iterator<Item = (&str, &[Row])> {
        self.models
            .iter()
            .map(|model| (model.as_str(), self.rows_of(model)))
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }

    /// Rows in the exact order they were first added.
    pub fn iter_generation_order(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.generation_order.iter().filter_map(|(model, index)| {
            self.rows
                .get(model)
                .and_then(|rows| rows.get(*index))
                .map(|row| (model.as_str(), row))
        })
    }

    /// Batches safe to insert in order: one batch per model in dependency
    /// order when the schema is acyclic, otherwise runs of generation order.
    ///
    /// Within a model rows keep generation order, which already places
    /// self-referenced rows before their referrers.
    pub fn rows_in_dependency_order<'a>(&'a self, graph: &SchemaGraph) -> Vec<RowBatch<'a>> {
        match graph.dependency_order() {
            Ok(order) => order
                .iter()
                .filter_map(|name| {
                    let (model, rows) = self.rows.get_key_value(name)?;
                    Some(RowBatch {
                        model: model.as_str(),
                        rows: rows.iter().collect(),
                    })
                })
                .collect(),
            Err(_) => {
                let mut batches: Vec<RowBatch<'a>> = Vec::new();
                for (model, row) in self.iter_generation_order() {
                    match batches.last_mut() {
                        Some(batch) if batch.model == model => batch.rows.push(row),
                        _ => batches.push(RowBatch {
                            model,
                            rows: vec![row],
                        }),
                    }
                }
                batches
            }
        }
    }

    pub fn len(&self) -> usize {
        self.generation_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generation_order.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.models.clear();
        self.generation_order.clear();
    }
}
