//! Core contracts for seedsmith.
//!
//! This crate defines the relational schema graph consumed by the generation
//! engine: models, scalar and relation fields, and unique constraints. The
//! graph is built once, indexed by model, and treated as immutable afterwards.

pub mod builder;
pub mod constraints;
pub mod error;
pub mod graph;
pub mod schema;
pub mod validation;

pub use builder::{ModelBuilder, RelationSpec, SchemaGraphBuilder};
pub use constraints::UniqueConstraint;
pub use error::{Error, Result};
pub use graph::{DependencyReport, DependencySummary, build_dependency_report};
pub use schema::{
    Field, GraphDocument, Model, ModelId, RelationField, ScalarField, ScalarType, SchemaGraph,
    Sequence,
};
pub use validation::validate_models;

/// Current contract version for `graph.json` artifacts.
pub const GRAPH_VERSION: &str = "0.1";
