use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::schema::{Field, Model};

/// Validate the structural invariants the engine relies on when indexing a graph.
///
/// This checks:
/// - duplicate models and fields
/// - relation targets exist and column lists line up
/// - unique constraint columns exist as scalar fields
pub fn validate_models(models: &[Model]) -> Result<()> {
    let mut catalog: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for model in models {
        if catalog.contains_key(model.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate model name: {}",
                model.name
            )));
        }

        let mut fields = BTreeSet::new();
        for field in &model.fields {
            if !fields.insert(field.name()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate field name: {}.{}",
                    model.name,
                    field.name()
                )));
            }
        }

        let columns = model.scalars().map(|field| field.name.as_str()).collect();
        catalog.insert(model.name.as_str(), columns);
    }

    for model in models {
        let Some(columns) = catalog.get(model.name.as_str()) else {
            continue;
        };

        for field in &model.fields {
            let (relation, local_model, remote_model) = match field {
                Field::Scalar(_) => continue,
                Field::Parent(relation) => (relation, model.name.as_str(), relation.model.as_str()),
                Field::Child(relation) => (relation, relation.model.as_str(), model.name.as_str()),
            };

            if relation.from_fields.len() != relation.to_fields.len() {
                return Err(Error::InvalidSchema(format!(
                    "relation {}.{} has {} local column(s) but {} referenced column(s)",
                    model.name,
                    relation.name,
                    relation.from_fields.len(),
                    relation.to_fields.len()
                )));
            }

            let local = catalog.get(local_model).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "relation {}.{} references unknown model '{}'",
                    model.name, relation.name, local_model
                ))
            })?;
            let remote = catalog.get(remote_model).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "relation {}.{} references unknown model '{}'",
                    model.name, relation.name, remote_model
                ))
            })?;

            for column in &relation.from_fields {
                if !local.contains(column.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "relation column not found: {}.{}",
                        local_model, column
                    )));
                }
            }
            for column in &relation.to_fields {
                if !remote.contains(column.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "referenced column not found: {}.{}",
                        remote_model, column
                    )));
                }
            }
        }

        for constraint in &model.unique_constraints {
            if constraint.fields.is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "unique constraint {} on {} has no columns",
                    constraint.name, model.name
                )));
            }
            for column in &constraint.fields {
                if !columns.contains(column.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "unique column not found: {}.{} ({})",
                        model.name, column, constraint.name
                    )));
                }
            }
        }
    }

    Ok(())
}
