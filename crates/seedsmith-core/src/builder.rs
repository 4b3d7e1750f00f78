//! Programmatic construction of schema graphs.
//!
//! Introspectors normally deserialize a [`GraphDocument`](crate::GraphDocument);
//! the builder is for callers that assemble small graphs by hand.

use crate::constraints::UniqueConstraint;
use crate::error::{Error, Result};
use crate::schema::{Field, Model, RelationField, ScalarField, SchemaGraph};

/// Incrementally builds one model.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    model: Model,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            model: Model {
                id: name.to_lowercase(),
                name,
                fields: Vec::new(),
                unique_constraints: Vec::new(),
            },
        }
    }

    /// Add an identifying column and register it in the primary key.
    pub fn id(mut self, field: ScalarField) -> Self {
        let field = field.id();
        let pkey = format!("{}_pkey", self.model.name);
        match self
            .model
            .unique_constraints
            .iter_mut()
            .find(|constraint| constraint.is_primary)
        {
            Some(constraint) => constraint.fields.push(field.name.clone()),
            None => self
                .model
                .unique_constraints
                .push(UniqueConstraint::primary(pkey, &[field.name.as_str()])),
        }
        self.model.fields.push(Field::Scalar(field));
        self
    }

    pub fn scalar(mut self, field: ScalarField) -> Self {
        self.model.fields.push(Field::Scalar(field));
        self
    }

    /// Declare a unique constraint over existing columns.
    pub fn unique(mut self, name: impl Into<String>, fields: &[&str]) -> Self {
        self.model
            .unique_constraints
            .push(UniqueConstraint::new(name, fields));
        self
    }

    pub fn build(self) -> Model {
        self.model
    }
}

/// A foreign key between two models, expanded into a `Parent` field on the
/// referencing model and a `Child` field on the referenced one.
#[derive(Debug, Clone)]
pub struct RelationSpec {
    child: String,
    parent_field: String,
    parent: String,
    child_field: String,
    from_fields: Vec<String>,
    to_fields: Vec<String>,
    required: bool,
}

impl RelationSpec {
    /// `child.parent_field` points at `parent`; `parent.child_field` lists the children.
    pub fn new(
        child: impl Into<String>,
        parent_field: impl Into<String>,
        parent: impl Into<String>,
        child_field: impl Into<String>,
    ) -> Self {
        Self {
            child: child.into(),
            parent_field: parent_field.into(),
            parent: parent.into(),
            child_field: child_field.into(),
            from_fields: Vec::new(),
            to_fields: Vec::new(),
            required: true,
        }
    }

    pub fn columns(mut self, from_fields: &[&str], to_fields: &[&str]) -> Self {
        self.from_fields = from_fields.iter().map(|field| field.to_string()).collect();
        self.to_fields = to_fields.iter().map(|field| field.to_string()).collect();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn relation_name(&self) -> String {
        format!("{}To{}_{}", self.child, self.parent, self.parent_field)
    }
}

/// Collects models and relations, then indexes them into a [`SchemaGraph`].
#[derive(Debug, Clone, Default)]
pub struct SchemaGraphBuilder {
    models: Vec<Model>,
    relations: Vec<RelationSpec>,
}

impl SchemaGraphBuilder {
    pub fn model(mut self, model: ModelBuilder) -> Self {
        self.models.push(model.build());
        self
    }

    pub fn relation(mut self, relation: RelationSpec) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn build(mut self) -> Result<SchemaGraph> {
        for relation in &self.relations {
            let relation_name = relation.relation_name();

            let child = self
                .models
                .iter_mut()
                .find(|model| model.name == relation.child)
                .ok_or_else(|| Error::UnknownModel(relation.child.clone()))?;
            child.fields.push(Field::Parent(RelationField {
                name: relation.parent_field.clone(),
                relation_name: relation_name.clone(),
                model: relation.parent.clone(),
                from_fields: relation.from_fields.clone(),
                to_fields: relation.to_fields.clone(),
                is_required: relation.required,
            }));

            let parent = self
                .models
                .iter_mut()
                .find(|model| model.name == relation.parent)
                .ok_or_else(|| Error::UnknownModel(relation.parent.clone()))?;
            parent.fields.push(Field::Child(RelationField {
                name: relation.child_field.clone(),
                relation_name,
                model: relation.child.clone(),
                from_fields: relation.from_fields.clone(),
                to_fields: relation.to_fields.clone(),
                is_required: false,
            }));
        }

        SchemaGraph::new(self.models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarType;

    #[test]
    fn relation_adds_both_sides() {
        let graph = SchemaGraph::builder()
            .model(ModelBuilder::new("Team").id(ScalarField::new("id", ScalarType::Int)))
            .model(
                ModelBuilder::new("Player")
                    .id(ScalarField::new("id", ScalarType::Int))
                    .scalar(ScalarField::new("teamId", ScalarType::Int)),
            )
            .relation(RelationSpec::new("Player", "team", "Team", "players").columns(&["teamId"], &["id"]))
            .build()
            .expect("build graph");

        let player = graph.require_model("Player").unwrap();
        let team_field = player.parents().next().expect("parent field");
        assert_eq!(team_field.model, "Team");
        assert!(team_field.is_required);
        assert!(player.is_relation_column("teamId"));

        let team = graph.require_model("Team").unwrap();
        let players = team.children().next().expect("child field");
        assert_eq!(players.model, "Player");
        assert_eq!(players.relation_name, team_field.relation_name);
    }

    #[test]
    fn composite_id_extends_primary_key() {
        let model = ModelBuilder::new("Membership")
            .id(ScalarField::new("userId", ScalarType::Int))
            .id(ScalarField::new("groupId", ScalarType::Int))
            .build();

        assert_eq!(model.unique_constraints.len(), 1);
        assert_eq!(model.unique_constraints[0].fields, vec!["userId", "groupId"]);
        assert!(model.unique_constraints[0].is_primary);
    }

    #[test]
    fn relation_to_unknown_model_fails() {
        let result = SchemaGraph::builder()
            .model(ModelBuilder::new("Player").scalar(ScalarField::new("teamId", ScalarType::Int)))
            .relation(RelationSpec::new("Player", "team", "Team", "players").columns(&["teamId"], &["id"]))
            .build();
        assert!(matches!(result, Err(Error::UnknownModel(name)) if name == "Team"));
    }
}
