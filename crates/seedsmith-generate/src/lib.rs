//! Deterministic, relation-aware seed data generation.
//!
//! A [`Session`] generates rows for a [`SchemaGraph`](seedsmith_core::SchemaGraph):
//! parents are created or connected on demand, children are nested under
//! their parent rows, unique constraints are repaired by regenerating values,
//! and every random choice is derived from a seed string so identical calls
//! produce identical rows.

pub mod config;
pub mod document;
mod engine;
pub mod errors;
pub mod input;
pub mod logging;
pub mod output;
pub mod report;
mod resolver;
pub mod seed;
pub mod session;
pub mod store;
pub mod templates;
pub mod value;
pub mod verify;

pub use config::EngineConfig;
pub use document::{
    LoweredPlan, OneOfGenerator, PatternGenerator, lower_document, run_document, run_plan_json,
};
pub use errors::{ConstraintViolation, GenerationError, Result};
pub use input::{
    ConnectContext, ConnectGenerator, ConnectPolicy, Count, FieldContext, FieldGenerator,
    FieldOverride, GenerateOptions, Input, RowContext, RowInput, RowSpec, UserModels, from_fn,
};
pub use logging::{LogTarget, init_logging};
pub use output::{CsvFile, write_model_csv, write_store_csv};
pub use report::{GenerationReport, ModelReport};
pub use seed::{PathSegment, SeedPath, derive_seed};
pub use session::{GenerationOutcome, Session};
pub use store::{RowBatch, ValueStore};
pub use templates::{SeededTemplates, ValueTemplates};
pub use value::{GeneratedValue, Row};
pub use verify::{IntegrityIssue, IntegrityReport, verify_store};
