use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-model counters for one generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReport {
    pub rows_generated: u64,
    /// Parent fields satisfied by an existing row.
    pub connects: u64,
    /// Unique collisions fixed by regenerating values.
    pub repairs: u64,
}

/// Summary of one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    /// Model the call was made for.
    pub model: String,
    pub seed: String,
    pub models: BTreeMap<String, ModelReport>,
    pub rows_total: u64,
    pub connects_total: u64,
    pub repairs_total: u64,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn new(run_id: String, model: &str, seed: &str) -> Self {
        Self {
            run_id,
            model: model.to_string(),
            seed: seed.to_string(),
            models: BTreeMap::new(),
            rows_total: 0,
            connects_total: 0,
            repairs_total: 0,
            duration_ms: 0,
        }
    }

    pub fn record_row(&mut self, model: &str) {
        self.entry(model).rows_generated += 1;
        self.rows_total += 1;
    }

    pub fn record_connect(&mut self, model: &str) {
        self.entry(model).connects += 1;
        self.connects_total += 1;
    }

    pub fn record_repair(&mut self, model: &str) {
        self.entry(model).repairs += 1;
        self.repairs_total += 1;
    }

    pub fn rows_for(&self, model: &str) -> u64 {
        self.models
            .get(model)
            .map(|report| report.rows_generated)
            .unwrap_or(0)
    }

    fn entry(&mut self, model: &str) -> &mut ModelReport {
        self.models.entry(model.to_string()).or_default()
    }
}
