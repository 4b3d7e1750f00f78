//! Caller-facing description of what to generate.
//!
//! An [`Input`] says how many rows of a model to produce and, per row, which
//! fields to override. Overrides nest: a parent field can carry its own
//! [`RowSpec`] and a child field its own [`Input`], so a single call can
//! describe a whole tree of related rows.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use seedsmith_plan::Count;

use crate::errors::Result;
use crate::store::ValueStore;
use crate::value::{GeneratedValue, Row};

/// What a field generator can see while producing a value.
pub struct FieldContext<'a> {
    pub model: &'a str,
    pub field: &'a str,
    /// `<row seed>/<field>`, plus an attempt suffix on collision retries.
    pub seed: &'a str,
    /// Position of the row within its batch.
    pub index: usize,
    /// Values assigned so far.
    pub row: &'a Row,
    /// Rows produced by the current call.
    pub plan_store: &'a ValueStore,
    /// Rows produced or imported over the session.
    pub global_store: &'a ValueStore,
}

/// Produces a value for one scalar field.
#[async_trait]
pub trait FieldGenerator: Send + Sync {
    async fn generate(&self, ctx: &FieldContext<'_>) -> Result<GeneratedValue>;
}

#[async_trait]
impl<F> FieldGenerator for F
where
    F: Fn(&FieldContext<'_>) -> Result<GeneratedValue> + Send + Sync,
{
    async fn generate(&self, ctx: &FieldContext<'_>) -> Result<GeneratedValue> {
        self(ctx)
    }
}

/// What a connect callback can see while choosing an existing parent row.
pub struct ConnectContext<'a> {
    /// Model of the parent being connected.
    pub model: &'a str,
    pub seed: &'a str,
    pub index: usize,
    pub plan_store: &'a ValueStore,
    pub global_store: &'a ValueStore,
}

/// Chooses an existing row to reference instead of generating a parent.
#[async_trait]
pub trait ConnectGenerator: Send + Sync {
    async fn connect(&self, ctx: &ConnectContext<'_>) -> Result<Row>;
}

#[async_trait]
impl<F> ConnectGenerator for F
where
    F: Fn(&ConnectContext<'_>) -> Result<Row> + Send + Sync,
{
    async fn connect(&self, ctx: &ConnectContext<'_>) -> Result<Row> {
        self(ctx)
    }
}

/// What a row factory can see while building per-row overrides.
pub struct RowContext<'a> {
    pub seed: &'a str,
    pub index: usize,
    pub plan_store: &'a ValueStore,
    pub global_store: &'a ValueStore,
}

type RowFactory = dyn Fn(&RowContext<'_>) -> Result<RowSpec> + Send + Sync;

/// Override for a single field.
#[derive(Clone)]
pub enum FieldOverride {
    Literal(GeneratedValue),
    Generator(Arc<dyn FieldGenerator>),
    /// Use an existing row as the parent.
    Connect(Arc<dyn ConnectGenerator>),
    /// Generate the parent with these overrides.
    Parent(Box<RowSpec>),
    /// Generate child rows under this row.
    Children(Input),
}

impl FieldOverride {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldOverride::Literal(_) => "literal",
            FieldOverride::Generator(_) => "generator",
            FieldOverride::Connect(_) => "connect",
            FieldOverride::Parent(_) => "parent",
            FieldOverride::Children(_) => "children",
        }
    }
}

impl fmt::Debug for FieldOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldOverride::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            FieldOverride::Parent(spec) => f.debug_tuple("Parent").field(spec).finish(),
            FieldOverride::Children(input) => f.debug_tuple("Children").field(input).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Ordered field overrides for one row.
///
/// Declaration order matters: scalar fields are generated in the order they
/// are last declared.
#[derive(Debug, Clone, Default)]
pub struct RowSpec {
    entries: Vec<(String, FieldOverride)>,
}

impl RowSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(self, field: impl Into<String>, value: impl Into<GeneratedValue>) -> Self {
        self.with(field, FieldOverride::Literal(value.into()))
    }

    pub fn null(self, field: impl Into<String>) -> Self {
        self.with(field, FieldOverride::Literal(GeneratedValue::Null))
    }

    /// Generate the field with a closure.
    pub fn generate<F>(self, field: impl Into<String>, generate: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> Result<GeneratedValue> + Send + Sync + 'static,
    {
        self.with(field, FieldOverride::Generator(from_fn(generate)))
    }

    pub fn generator(self, field: impl Into<String>, generator: Arc<dyn FieldGenerator>) -> Self {
        self.with(field, FieldOverride::Generator(generator))
    }

    /// Reference an existing row chosen by a closure.
    pub fn connect<F>(self, field: impl Into<String>, connect: F) -> Self
    where
        F: Fn(&ConnectContext<'_>) -> Result<Row> + Send + Sync + 'static,
    {
        self.with(field, FieldOverride::Connect(Arc::new(connect)))
    }

    pub fn parent(self, field: impl Into<String>, spec: RowSpec) -> Self {
        self.with(field, FieldOverride::Parent(Box::new(spec)))
    }

    pub fn children(self, field: impl Into<String>, input: Input) -> Self {
        self.with(field, FieldOverride::Children(input))
    }

    /// Declare an override; a field declared twice moves to the later position.
    pub fn with(mut self, field: impl Into<String>, value: FieldOverride) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldOverride) {
        let field = field.into();
        self.entries.retain(|(name, _)| *name != field);
        self.entries.push((field, value));
    }

    pub fn get(&self, field: &str) -> Option<&FieldOverride> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &FieldOverride)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Overrides for one row: fixed, or built from the row's seed and position.
#[derive(Clone)]
pub enum RowInput {
    Spec(RowSpec),
    Factory(Arc<RowFactory>),
}

impl RowInput {
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&RowContext<'_>) -> Result<RowSpec> + Send + Sync + 'static,
    {
        RowInput::Factory(Arc::new(factory))
    }
}

impl From<RowSpec> for RowInput {
    fn from(spec: RowSpec) -> Self {
        RowInput::Spec(spec)
    }
}

impl fmt::Debug for RowInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowInput::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
            RowInput::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Rows to generate for one model.
#[derive(Debug, Clone)]
pub enum Input {
    /// One row per entry.
    Rows(Vec<RowInput>),
    /// `count` rows sharing the same overrides.
    Count { count: Count, row: RowInput },
}

impl Input {
    /// `count` rows with no overrides.
    pub fn count(count: u64) -> Self {
        Input::repeat(Count::Fixed(count), RowSpec::new())
    }

    /// Between `min` and `max` rows (inclusive) with no overrides.
    pub fn range(min: u64, max: u64) -> Self {
        Input::repeat(Count::Range { min, max }, RowSpec::new())
    }

    pub fn repeat(count: Count, row: impl Into<RowInput>) -> Self {
        Input::Count {
            count,
            row: row.into(),
        }
    }

    /// `count` rows whose overrides come from `factory`.
    pub fn each<F>(count: Count, factory: F) -> Self
    where
        F: Fn(&RowContext<'_>) -> Result<RowSpec> + Send + Sync + 'static,
    {
        Input::Count {
            count,
            row: RowInput::factory(factory),
        }
    }

    pub fn rows(rows: impl IntoIterator<Item = RowSpec>) -> Self {
        Input::Rows(rows.into_iter().map(RowInput::Spec).collect())
    }

    pub fn one(spec: RowSpec) -> Self {
        Input::Rows(vec![RowInput::Spec(spec)])
    }
}

/// Field overrides applied to every row of a model.
///
/// Only literals and generators are meaningful here; relation overrides are
/// per row.
#[derive(Debug, Clone, Default)]
pub struct UserModels {
    models: BTreeMap<String, RowSpec>,
}

impl UserModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, name: impl Into<String>, spec: RowSpec) -> Self {
        self.models.insert(name.into(), spec);
        self
    }

    pub fn get(&self, model: &str) -> Option<&RowSpec> {
        self.models.get(model)
    }

    pub fn field(&self, model: &str, field: &str) -> Option<&FieldOverride> {
        self.get(model).and_then(|spec| spec.get(field))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowSpec)> {
        self.models.iter().map(|(name, spec)| (name.as_str(), spec))
    }
}

/// Fallback applied to parent fields the caller did not specify.
#[derive(Debug, Clone)]
pub enum ConnectPolicy {
    /// Reuse any row already in the session store.
    All,
    /// Reuse only the listed rows, per parent model.
    Candidates(BTreeMap<String, Vec<Row>>),
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Root seed; the session default is used when absent.
    pub seed: Option<String>,
    /// Call-level field overrides, applied after the session's.
    pub models: UserModels,
    pub connect: Option<ConnectPolicy>,
}

impl GenerateOptions {
    pub fn seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn models(mut self, models: UserModels) -> Self {
        self.models = models;
        self
    }

    pub fn connect(mut self, policy: ConnectPolicy) -> Self {
        self.connect = Some(policy);
        self
    }
}

/// Wrap a closure as a shareable field generator.
pub fn from_fn<F>(f: F) -> Arc<dyn FieldGenerator>
where
    F: Fn(&FieldContext<'_>) -> Result<GeneratedValue> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeclared_fields_move_to_the_end() {
        let spec = RowSpec::new()
            .value("a", 1)
            .value("b", 2)
            .value("a", 3);
        assert_eq!(spec.fields().collect::<Vec<_>>(), vec!["b", "a"]);
        assert!(matches!(
            spec.get("a"),
            Some(FieldOverride::Literal(GeneratedValue::Int(3)))
        ));
    }

    #[test]
    fn nested_overrides_keep_their_shape() {
        let spec = RowSpec::new()
            .parent("team", RowSpec::new().value("name", "Lions"))
            .children("games", Input::count(2));
        assert_eq!(spec.get("team").map(FieldOverride::kind), Some("parent"));
        assert!(matches!(
            spec.get("games"),
            Some(FieldOverride::Children(Input::Count { count: Count::Fixed(2), .. }))
        ));
    }

    #[tokio::test]
    async fn closures_act_as_generators() {
        let generator = from_fn(|ctx: &FieldContext<'_>| Ok(GeneratedValue::from(ctx.seed)));
        let store = ValueStore::new();
        let row = Row::new();
        let ctx = FieldContext {
            model: "User",
            field: "email",
            seed: "s/0/User/0/email",
            index: 0,
            row: &row,
            plan_store: &store,
            global_store: &store,
        };
        let value = generator.generate(&ctx).await.unwrap();
        assert_eq!(value, GeneratedValue::from("s/0/User/0/email"));
    }
}
