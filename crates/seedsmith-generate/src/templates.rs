use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde_json::json;

use seedsmith_core::{Model, ScalarField, ScalarType};

use crate::errors::Result;
use crate::input::FieldContext;
use crate::seed::seeded_rng;
use crate::value::GeneratedValue;

/// Default value source for scalar fields nobody overrode.
///
/// Implementations must be deterministic in `ctx.seed`.
#[async_trait]
pub trait ValueTemplates: Send + Sync {
    async fn generate(
        &self,
        model: &Model,
        field: &ScalarField,
        ctx: &FieldContext<'_>,
    ) -> Result<GeneratedValue>;
}

/// Type-driven values drawn from the field seed.
#[derive(Debug, Clone)]
pub struct SeededTemplates {
    base_date: NaiveDate,
}

impl SeededTemplates {
    pub fn new(base_date: NaiveDate) -> Self {
        Self { base_date }
    }
}

impl Default for SeededTemplates {
    fn default() -> Self {
        Self::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default())
    }
}

#[async_trait]
impl ValueTemplates for SeededTemplates {
    async fn generate(
        &self,
        _model: &Model,
        field: &ScalarField,
        ctx: &FieldContext<'_>,
    ) -> Result<GeneratedValue> {
        let mut rng = seeded_rng(ctx.seed);
        Ok(value_for_type(field, self.base_date, &mut rng))
    }
}

fn value_for_type(field: &ScalarField, base_date: NaiveDate, rng: &mut ChaCha8Rng) -> GeneratedValue {
    let name = field.name.to_lowercase();
    match field.scalar_type {
        ScalarType::Uuid => GeneratedValue::Uuid(random_uuid(rng)),
        ScalarType::Int => GeneratedValue::Int(rng.random_range(1..=100_000)),
        ScalarType::Float => {
            let cents: i64 = rng.random_range(0..=10_000_000);
            GeneratedValue::Float(cents as f64 / 100.0)
        }
        ScalarType::Bool => GeneratedValue::Bool(rng.random_bool(0.5)),
        ScalarType::Date => GeneratedValue::Date(base_date + Duration::days(rng.random_range(0..=365))),
        ScalarType::Time => GeneratedValue::Time(random_time(rng)),
        ScalarType::Timestamp => {
            let date = base_date + Duration::days(rng.random_range(0..=365));
            GeneratedValue::Timestamp(NaiveDateTime::new(date, random_time(rng)))
        }
        ScalarType::Json => GeneratedValue::Json(json!({ "value": rng.random::<u32>() })),
        ScalarType::Text if name.contains("email") => {
            GeneratedValue::Text(format!("user{:06}@example.com", rng.random_range(0..1_000_000)))
        }
        ScalarType::Text if name.contains("name") => GeneratedValue::Text(random_name(rng)),
        ScalarType::Text => GeneratedValue::Text(format!("{}_{:08x}", field.name, rng.random::<u32>())),
    }
}

fn random_uuid(rng: &mut ChaCha8Rng) -> String {
    let bytes: [u8; 16] = rng.random();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

fn random_time(rng: &mut ChaCha8Rng) -> NaiveTime {
    let seconds = rng.random_range(0..86_400);
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or_default()
}

fn random_name(rng: &mut ChaCha8Rng) -> String {
    const FIRST: [&str; 8] = ["Ana", "Bruno", "Carla", "Diego", "Elena", "Felix", "Greta", "Hugo"];
    const LAST: [&str; 8] = ["Silva", "Moreau", "Okafor", "Tanaka", "Novak", "Reyes", "Larsen", "Costa"];
    let first = FIRST[rng.random_range(0..FIRST.len())];
    let last = LAST[rng.random_range(0..LAST.len())];
    format!("{first} {last}")
}

#[cfg(test)]
mod tests {
    use seedsmith_core::ModelBuilder;

    use super::*;
    use crate::store::ValueStore;
    use crate::value::Row;

    async fn generate(field: &ScalarField, seed: &str) -> GeneratedValue {
        let model = ModelBuilder::new("User").scalar(field.clone()).build();
        let store = ValueStore::new();
        let row = Row::new();
        let ctx = FieldContext {
            model: "User",
            field: &field.name,
            seed,
            index: 0,
            row: &row,
            plan_store: &store,
            global_store: &store,
        };
        SeededTemplates::default()
            .generate(&model, field, &ctx)
            .await
            .expect("template value")
    }

    #[tokio::test]
    async fn same_seed_same_value() {
        let field = ScalarField::new("email", ScalarType::Text);
        let first = generate(&field, "s/0/User/0/email").await;
        let again = generate(&field, "s/0/User/0/email").await;
        let other = generate(&field, "s/0/User/1/email").await;
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert!(first.as_str().unwrap().ends_with("@example.com"));
    }

    #[tokio::test]
    async fn values_match_scalar_type() {
        let uuid = generate(&ScalarField::new("id", ScalarType::Uuid), "u").await;
        assert!(uuid::Uuid::parse_str(uuid.as_str().unwrap()).is_ok());

        let date = generate(&ScalarField::new("born", ScalarType::Date), "d").await;
        let GeneratedValue::Date(date) = date else {
            panic!("expected a date");
        };
        assert!(date >= NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        let flag = generate(&ScalarField::new("active", ScalarType::Bool), "b").await;
        assert!(matches!(flag, GeneratedValue::Bool(_)));
    }
}
