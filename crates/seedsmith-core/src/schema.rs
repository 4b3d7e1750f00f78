use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::UniqueConstraint;
use crate::error::{Error, Result};
use crate::graph::build_dependency_report;
use crate::validation::validate_models;

/// Position of a model inside the graph arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct ModelId(pub usize);

/// Storage shape of a scalar column, as reported by the introspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Int,
    Float,
    Bool,
    Text,
    Uuid,
    Date,
    Time,
    Timestamp,
    Json,
}

/// Auto-incrementing sequence backing a scalar column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Sequence {
    pub name: String,
    /// First value handed out when the sequence has never been advanced.
    #[serde(default = "default_sequence_start")]
    pub start: i64,
    #[serde(default = "default_sequence_increment")]
    pub increment: i64,
}

fn default_sequence_start() -> i64 {
    1
}

fn default_sequence_increment() -> i64 {
    1
}

/// Column materialized on the model's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScalarField {
    pub name: String,
    pub scalar_type: ScalarType,
    #[serde(default)]
    pub is_id: bool,
    #[serde(default)]
    pub is_required: bool,
    /// Computed by the database (identity `ALWAYS`, generated columns).
    #[serde(default)]
    pub is_generated: bool,
    #[serde(default)]
    pub has_default_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<Sequence>,
}

impl ScalarField {
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            is_id: false,
            is_required: true,
            is_generated: false,
            has_default_value: false,
            sequence: None,
        }
    }

    pub fn id(mut self) -> Self {
        self.is_id = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_required = false;
        self
    }

    pub fn generated(mut self) -> Self {
        self.is_generated = true;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default_value = true;
        self
    }

    /// Back the column with an auto-incrementing sequence.
    pub fn sequence(mut self, name: impl Into<String>) -> Self {
        self.has_default_value = true;
        self.sequence = Some(Sequence {
            name: name.into(),
            start: default_sequence_start(),
            increment: default_sequence_increment(),
        });
        self
    }
}

/// Relation metadata shared by both sides of a foreign key.
///
/// `from_fields` are always the referencing (child-side) columns and
/// `to_fields` the referenced (parent-side) columns, regardless of which
/// model carries the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RelationField {
    pub name: String,
    pub relation_name: String,
    /// Model on the other side of the relation.
    pub model: String,
    pub from_fields: Vec<String>,
    pub to_fields: Vec<String>,
    #[serde(default)]
    pub is_required: bool,
}

/// A column or a relationship declared on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Field {
    Scalar(ScalarField),
    /// Outgoing relation: this model holds the foreign key columns.
    Parent(RelationField),
    /// Incoming relation: another model's `Parent` field points here.
    Child(RelationField),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Field::Scalar(field) => &field.name,
            Field::Parent(field) | Field::Child(field) => &field.name,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarField> {
        match self {
            Field::Scalar(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_parent(&self) -> Option<&RelationField> {
        match self {
            Field::Parent(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_child(&self) -> Option<&RelationField> {
        match self {
            Field::Child(field) => Some(field),
            _ => None,
        }
    }
}

/// A named entity corresponding to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub unique_constraints: Vec<UniqueConstraint>,
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn scalar(&self, name: &str) -> Option<&ScalarField> {
        self.field(name).and_then(Field::as_scalar)
    }

    pub fn scalars(&self) -> impl Iterator<Item = &ScalarField> {
        self.fields.iter().filter_map(Field::as_scalar)
    }

    pub fn parents(&self) -> impl Iterator<Item = &RelationField> {
        self.fields.iter().filter_map(Field::as_parent)
    }

    pub fn children(&self) -> impl Iterator<Item = &RelationField> {
        self.fields.iter().filter_map(Field::as_child)
    }

    /// Parent relation whose local columns include `column`.
    pub fn parent_owning(&self, column: &str) -> Option<&RelationField> {
        self.parents()
            .find(|parent| parent.from_fields.iter().any(|from| from == column))
    }

    /// True when `column` is materialized by a parent relation rather than generated.
    pub fn is_relation_column(&self, column: &str) -> bool {
        self.parent_owning(column).is_some()
    }
}

/// Serialized form of a schema graph (`graph.json`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GraphDocument {
    pub graph_version: String,
    pub models: Vec<Model>,
}

/// In-memory relational schema, indexed by model name.
///
/// Models live in a flat arena and relations refer to each other by name, so
/// cyclic schemas need no shared ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct SchemaGraph {
    models: Vec<Model>,
    index: BTreeMap<String, ModelId>,
}

impl SchemaGraph {
    pub fn new(models: Vec<Model>) -> Result<Self> {
        validate_models(&models)?;
        let index = models
            .iter()
            .enumerate()
            .map(|(idx, model)| (model.name.clone(), ModelId(idx)))
            .collect();
        Ok(Self { models, index })
    }

    pub fn builder() -> crate::builder::SchemaGraphBuilder {
        crate::builder::SchemaGraphBuilder::default()
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn model_id(&self, name: &str) -> Option<ModelId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id.0)
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.model_id(name).and_then(|id| self.get(id))
    }

    pub fn require_model(&self, name: &str) -> Result<&Model> {
        self.model(name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    /// Model names ordered parents-before-children, or the models left on a cycle.
    pub fn dependency_order(&self) -> std::result::Result<Vec<String>, Vec<String>> {
        let report = build_dependency_report(self);
        match (report.topo_order, report.cycle) {
            (Some(order), _) => Ok(order),
            (None, Some(cycle)) => Err(cycle),
            (None, None) => Ok(Vec::new()),
        }
    }
}

impl TryFrom<GraphDocument> for SchemaGraph {
    type Error = Error;

    fn try_from(document: GraphDocument) -> Result<Self> {
        SchemaGraph::new(document.models)
    }
}

impl From<SchemaGraph> for GraphDocument {
    fn from(graph: SchemaGraph) -> Self {
        GraphDocument {
            graph_version: crate::GRAPH_VERSION.to_string(),
            models: graph.models,
        }
    }
}
