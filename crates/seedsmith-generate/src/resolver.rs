//! Unique-constraint enforcement for a freshly generated row.
//!
//! Constraints are checked smallest first. When a row's values collide with
//! an earlier row, the resolver searches alternative values for the fields
//! that can be regenerated: parents are re-picked from the connect pool and
//! scalar generators are re-run with per-attempt seeds. The search is a
//! depth-first walk over those fields, accepting the first combination whose
//! values are unseen. Columns of a constraint that has been settled are
//! locked so later repairs cannot reopen it.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use seedsmith_core::{Model, RelationField, ScalarField, UniqueConstraint};

use crate::engine::{RowScope, ScalarSource};
use crate::errors::{ConstraintViolation, GenerationError, Result};
use crate::seed::{attempt_seed, field_seed};
use crate::value::{GeneratedValue, Row};

/// Values already taken per `(model, constraint)`, kept for a whole session.
#[derive(Debug, Default)]
pub(crate) struct UniqueIndex {
    seen: HashMap<(String, String), HashSet<String>>,
}

impl UniqueIndex {
    pub(crate) fn contains(&self, model: &str, constraint: &str, key: &str) -> bool {
        self.seen
            .get(&(model.to_string(), constraint.to_string()))
            .is_some_and(|keys| keys.contains(key))
    }

    pub(crate) fn insert(&mut self, model: &str, constraint: &str, key: String) -> bool {
        self.seen
            .entry((model.to_string(), constraint.to_string()))
            .or_default()
            .insert(key)
    }

    /// Register every complete constraint tuple of an existing row.
    pub(crate) fn record(&mut self, model: &Model, row: &Row) {
        for constraint in &model.unique_constraints {
            if let Some(key) = tuple_key(row, &constraint.fields) {
                self.insert(&model.name, &constraint.name, key);
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Key for the values of `columns`, or `None` when any is missing or null.
///
/// Nulls never collide, so a tuple containing one is always acceptable.
pub(crate) fn tuple_key(row: &Row, columns: &[String]) -> Option<String> {
    let mut parts = Vec::with_capacity(columns.len());
    for column in columns {
        match row.get(column) {
            None | Some(GeneratedValue::Null) => return None,
            Some(value) => parts.push(value.key_fragment()),
        }
    }
    Some(parts.join("|"))
}

/// Field that may take a different value during a repair.
enum RetryField<'a> {
    Parent {
        relation: &'a RelationField,
        pool: &'a [Row],
    },
    Scalar {
        field: &'a ScalarField,
        source: ScalarSource<'a>,
    },
}

impl RetryField<'_> {
    fn columns(&self) -> Vec<String> {
        match self {
            RetryField::Parent { relation, .. } => relation.from_fields.clone(),
            RetryField::Scalar { field, .. } => vec![field.name.clone()],
        }
    }
}

enum Candidate {
    Exhausted,
    /// Unusable candidate; move on to the next one.
    Skip,
    Values(Vec<(String, GeneratedValue)>),
}

/// Checks and repairs the unique constraints of one row.
pub(crate) struct ConstraintResolver<'r> {
    unique: &'r mut UniqueIndex,
    max_attempts: usize,
}

impl<'r> ConstraintResolver<'r> {
    pub(crate) fn new(unique: &'r mut UniqueIndex, max_attempts: usize) -> Self {
        Self {
            unique,
            max_attempts,
        }
    }

    /// Make `row` satisfy every applicable constraint and record its tuples.
    ///
    /// Returns the number of repairs performed.
    pub(crate) async fn resolve(&mut self, row: &mut Row, scope: &RowScope<'_>) -> Result<usize> {
        let model = scope.model;
        let mut constraints: Vec<&UniqueConstraint> = model
            .unique_constraints
            .iter()
            .filter(|constraint| !awaits_database_default(model, row, constraint))
            .collect();
        constraints.sort_by_key(|constraint| constraint.fields.len());

        let mut locked: HashSet<String> = HashSet::new();
        let mut repairs = 0;

        for constraint in constraints {
            let Some(key) = tuple_key(row, &constraint.fields) else {
                continue;
            };

            if self.unique.contains(&model.name, &constraint.name, &key) {
                let changed = self.repair(row, constraint, &locked, scope).await?;
                repairs += 1;
                debug!(
                    model = %model.name,
                    constraint = %constraint.name,
                    seed = scope.row_seed,
                    columns = ?changed,
                    "repaired unique collision"
                );
                locked.extend(changed);
            }

            if let Some(key) = tuple_key(row, &constraint.fields) {
                self.unique.insert(&model.name, &constraint.name, key);
            }
            locked.extend(constraint.fields.iter().cloned());
        }

        Ok(repairs)
    }

    async fn repair(
        &self,
        row: &mut Row,
        constraint: &UniqueConstraint,
        locked: &HashSet<String>,
        scope: &RowScope<'_>,
    ) -> Result<Vec<String>> {
        let model = scope.model;

        let parents: Vec<RetryField<'_>> = model
            .parents()
            .filter(|relation| {
                relation
                    .from_fields
                    .iter()
                    .any(|column| constraint.contains(column))
            })
            .filter(|relation| {
                !relation
                    .from_fields
                    .iter()
                    .any(|column| locked.contains(column) || scope.field_override(column).is_some())
            })
            .filter(|relation| scope.field_override(&relation.name).is_none())
            .filter_map(|relation| {
                scope
                    .connect_pool(&relation.model)
                    .map(|pool| RetryField::Parent { relation, pool })
            })
            .collect();

        let scalars: Vec<RetryField<'_>> = constraint
            .fields
            .iter()
            .filter(|column| !locked.contains(*column) && !model.is_relation_column(column))
            .filter_map(|column| model.scalar(column))
            .filter_map(|field| match scope.scalar_source(field) {
                Ok(source @ (ScalarSource::Generator(_) | ScalarSource::Template)) => {
                    Some(RetryField::Scalar { field, source })
                }
                _ => None,
            })
            .collect();

        let mut passes: Vec<Vec<&RetryField<'_>>> = Vec::new();
        if !parents.is_empty() {
            passes.push(parents.iter().collect());
        }
        if !scalars.is_empty() {
            passes.push(parents.iter().chain(scalars.iter()).collect());
        }

        for fields in passes {
            if let Some(found) = self.search(row, constraint, &fields, scope).await? {
                *row = found;
                return Ok(fields.iter().flat_map(|field| field.columns()).collect());
            }
        }

        warn!(
            model = %model.name,
            constraint = %constraint.name,
            seed = scope.row_seed,
            "unique constraint cannot be repaired"
        );
        Err(GenerationError::UnrepairableConstraint(Box::new(
            ConstraintViolation {
                constraint: constraint.name.clone(),
                model: model.name.clone(),
                columns: constraint
                    .fields
                    .iter()
                    .map(|column| {
                        let value = row.get(column).cloned().unwrap_or(GeneratedValue::Null);
                        (column.clone(), value)
                    })
                    .collect(),
                seed_path: scope.row_seed.to_string(),
                row: row.clone(),
            },
        )))
    }

    /// Depth-first search over candidate values, one stack frame per field.
    async fn search(
        &self,
        base: &Row,
        constraint: &UniqueConstraint,
        fields: &[&RetryField<'_>],
        scope: &RowScope<'_>,
    ) -> Result<Option<Row>> {
        let mut working = base.clone();
        // Next candidate to try for each open frame.
        let mut cursors: Vec<usize> = vec![0];

        while let Some(depth) = cursors.len().checked_sub(1) {
            let cursor = cursors[depth];
            cursors[depth] += 1;

            let values = match self.candidate(fields[depth], cursor, &working, scope).await? {
                Candidate::Exhausted => {
                    cursors.pop();
                    continue;
                }
                Candidate::Skip => continue,
                Candidate::Values(values) => values,
            };
            for (column, value) in values {
                working.set(column, value);
            }

            if depth + 1 < fields.len() {
                cursors.push(0);
                continue;
            }

            match tuple_key(&working, &constraint.fields) {
                None => return Ok(Some(working)),
                Some(key) if !self.unique.contains(&scope.model.name, &constraint.name, &key) => {
                    return Ok(Some(working));
                }
                Some(_) => {}
            }
        }

        Ok(None)
    }

    async fn candidate(
        &self,
        field: &RetryField<'_>,
        cursor: usize,
        working: &Row,
        scope: &RowScope<'_>,
    ) -> Result<Candidate> {
        match field {
            RetryField::Parent { relation, pool } => {
                let Some(parent) = pool.get(cursor) else {
                    return Ok(Candidate::Exhausted);
                };
                let mut values = Vec::with_capacity(relation.from_fields.len());
                for (from, to) in relation.from_fields.iter().zip(&relation.to_fields) {
                    match parent.get(to) {
                        Some(value) if !value.is_null() => values.push((from.clone(), value.clone())),
                        _ => return Ok(Candidate::Skip),
                    }
                }
                Ok(Candidate::Values(values))
            }
            RetryField::Scalar { field, source } => {
                if cursor >= self.max_attempts {
                    return Ok(Candidate::Exhausted);
                }
                let seed = attempt_seed(&field_seed(scope.row_seed, &field.name), cursor);
                let value = scope.invoke(field, source, &seed, working).await?;
                Ok(Candidate::Values(vec![(field.name.clone(), value)]))
            }
        }
    }
}

// Constraints over a database-defaulted column the caller left unset cannot be
// checked before insertion.
fn awaits_database_default(model: &Model, row: &Row, constraint: &UniqueConstraint) -> bool {
    constraint.fields.iter().any(|column| {
        model
            .scalar(column)
            .is_some_and(|field| field.has_default_value && !row.contains(column))
    })
}
