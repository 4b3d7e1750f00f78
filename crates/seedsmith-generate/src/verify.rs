use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use seedsmith_core::SchemaGraph;

use crate::resolver::tuple_key;
use crate::store::ValueStore;

/// A rule broken by the stored rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub code: String,
    pub model: String,
    pub message: String,
}

/// Result of checking a store against its schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub rows_checked: u64,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, code: &str) -> usize {
        self.issues.iter().filter(|issue| issue.code == code).count()
    }

    fn push(&mut self, code: &str, model: &str, message: String) {
        self.issues.push(IntegrityIssue {
            code: code.to_string(),
            model: model.to_string(),
            message,
        });
    }
}

/// Check unique constraints and references across every stored row.
///
/// References are resolved against the store only, so rows connected from an
/// external candidate table must be imported first to verify cleanly.
pub fn verify_store(graph: &SchemaGraph, store: &ValueStore) -> IntegrityReport {
    let mut report = IntegrityReport::default();

    for (name, rows) in store.all_rows() {
        report.rows_checked += rows.len() as u64;
        let Some(model) = graph.model(name) else {
            report.push("unknown_model", name, format!("model '{name}' not found in graph"));
            continue;
        };

        for constraint in &model.unique_constraints {
            let mut seen: HashMap<String, usize> = HashMap::new();
            for (idx, row) in rows.iter().enumerate() {
                let Some(key) = tuple_key(row, &constraint.fields) else {
                    continue;
                };
                match seen.entry(key) {
                    Entry::Occupied(first) => report.push(
                        "duplicate_unique",
                        name,
                        format!(
                            "rows {} and {idx} share ({}) under '{}'",
                            first.get(),
                            constraint.fields.join(", "),
                            constraint.name
                        ),
                    ),
                    Entry::Vacant(slot) => {
                        slot.insert(idx);
                    }
                }
            }
        }

        for parent in model.parents() {
            let targets: HashSet<String> = store
                .rows_of(&parent.model)
                .iter()
                .filter_map(|row| tuple_key(row, &parent.to_fields))
                .collect();

            for (idx, row) in rows.iter().enumerate() {
                match tuple_key(row, &parent.from_fields) {
                    Some(key) if !targets.contains(&key) => report.push(
                        "dangling_reference",
                        name,
                        format!(
                            "row {idx} references a missing '{}' through '{}'",
                            parent.model, parent.name
                        ),
                    ),
                    Some(_) => {}
                    None if parent.is_required => report.push(
                        "missing_reference",
                        name,
                        format!("row {idx} has no value for required relation '{}'", parent.name),
                    ),
                    None => {}
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use seedsmith_core::{ModelBuilder, RelationSpec, ScalarField, ScalarType};

    use super::*;
    use crate::value::Row;

    fn graph() -> SchemaGraph {
        let int = |name: &str| ScalarField::new(name, ScalarType::Int);
        SchemaGraph::builder()
            .model(ModelBuilder::new("Team").id(int("id")))
            .model(ModelBuilder::new("Player").id(int("id")).scalar(int("teamId")))
            .relation(RelationSpec::new("Player", "team", "Team", "players").columns(&["teamId"], &["id"]))
            .build()
            .unwrap()
    }

    #[test]
    fn clean_store_passes() {
        let mut store = ValueStore::new();
        store.add("Team", Row::new().with("id", 1));
        store.add("Player", Row::new().with("id", 1).with("teamId", 1));
        store.add("Player", Row::new().with("id", 2).with("teamId", 1));

        let report = verify_store(&graph(), &store);
        assert!(report.is_ok(), "{:?}", report.issues);
        assert_eq!(report.rows_checked, 3);
    }

    #[test]
    fn flags_duplicates_and_dangling_references() {
        let mut store = ValueStore::new();
        store.add("Team", Row::new().with("id", 1));
        store.add("Team", Row::new().with("id", 1));
        store.add("Player", Row::new().with("id", 1).with("teamId", 9));
        store.add("Player", Row::new().with("id", 2));

        let report = verify_store(&graph(), &store);
        assert_eq!(report.count("duplicate_unique"), 1);
        assert_eq!(report.count("dangling_reference"), 1);
        assert_eq!(report.count("missing_reference"), 1);
    }
}
