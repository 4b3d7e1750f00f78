use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

use seedsmith_core::ScalarType;

/// Value assigned to a scalar column.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Json(Value),
}

impl GeneratedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GeneratedValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GeneratedValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GeneratedValue::Int(value) => Some(*value as f64),
            GeneratedValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GeneratedValue::Text(value) | GeneratedValue::Uuid(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Plain-text rendering used for CSV cells; null becomes an empty cell.
    pub fn to_text(&self) -> String {
        match self {
            GeneratedValue::Null => String::new(),
            GeneratedValue::Bool(value) => value.to_string(),
            GeneratedValue::Int(value) => value.to_string(),
            GeneratedValue::Float(value) => value.to_string(),
            GeneratedValue::Text(value) | GeneratedValue::Uuid(value) => value.clone(),
            GeneratedValue::Date(value) => value.format("%Y-%m-%d").to_string(),
            GeneratedValue::Time(value) => value.format("%H:%M:%S").to_string(),
            GeneratedValue::Timestamp(value) => value.format("%Y-%m-%dT%H:%M:%S").to_string(),
            GeneratedValue::Json(value) => value.to_string(),
        }
    }

    /// Fragment contributed to a unique-constraint key.
    ///
    /// Fragments are tagged by kind and length-prefixed so that joining them
    /// never makes two different tuples look alike.
    pub fn key_fragment(&self) -> String {
        let (tag, text) = match self {
            GeneratedValue::Null => return "<null>".to_string(),
            GeneratedValue::Bool(_) => ('b', self.to_text()),
            GeneratedValue::Int(_) => ('i', self.to_text()),
            GeneratedValue::Float(_) => ('f', self.to_text()),
            GeneratedValue::Text(_) => ('s', self.to_text()),
            GeneratedValue::Uuid(_) => ('u', self.to_text()),
            GeneratedValue::Date(_) => ('d', self.to_text()),
            GeneratedValue::Time(_) => ('t', self.to_text()),
            GeneratedValue::Timestamp(_) => ('T', self.to_text()),
            GeneratedValue::Json(_) => ('j', self.to_text()),
        };
        format!("{tag}{}:{text}", text.len())
    }

    /// Convert a JSON value from a plan or candidate table into the column's shape.
    pub fn from_json(value: &Value, scalar_type: ScalarType) -> Self {
        match (value, scalar_type) {
            (Value::Null, _) => GeneratedValue::Null,
            (_, ScalarType::Json) => GeneratedValue::Json(value.clone()),
            (Value::Bool(flag), _) => GeneratedValue::Bool(*flag),
            (Value::Number(number), ScalarType::Float) => {
                GeneratedValue::Float(number.as_f64().unwrap_or_default())
            }
            (Value::Number(number), _) => match number.as_i64() {
                Some(int) => GeneratedValue::Int(int),
                None => GeneratedValue::Float(number.as_f64().unwrap_or_default()),
            },
            (Value::String(text), ScalarType::Uuid) => GeneratedValue::Uuid(text.clone()),
            (Value::String(text), ScalarType::Date) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(GeneratedValue::Date)
                .unwrap_or_else(|_| GeneratedValue::Text(text.clone())),
            (Value::String(text), ScalarType::Time) => NaiveTime::parse_from_str(text, "%H:%M:%S")
                .map(GeneratedValue::Time)
                .unwrap_or_else(|_| GeneratedValue::Text(text.clone())),
            (Value::String(text), ScalarType::Timestamp) => {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                    .map(GeneratedValue::Timestamp)
                    .unwrap_or_else(|_| GeneratedValue::Text(text.clone()))
            }
            (Value::String(text), _) => GeneratedValue::Text(text.clone()),
            (other, _) => GeneratedValue::Json(other.clone()),
        }
    }
}

impl From<i64> for GeneratedValue {
    fn from(value: i64) -> Self {
        GeneratedValue::Int(value)
    }
}

impl From<i32> for GeneratedValue {
    fn from(value: i32) -> Self {
        GeneratedValue::Int(i64::from(value))
    }
}

impl From<bool> for GeneratedValue {
    fn from(value: bool) -> Self {
        GeneratedValue::Bool(value)
    }
}

impl From<f64> for GeneratedValue {
    fn from(value: f64) -> Self {
        GeneratedValue::Float(value)
    }
}

impl From<&str> for GeneratedValue {
    fn from(value: &str) -> Self {
        GeneratedValue::Text(value.to_string())
    }
}

impl From<String> for GeneratedValue {
    fn from(value: String) -> Self {
        GeneratedValue::Text(value)
    }
}

impl Serialize for GeneratedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GeneratedValue::Null => serializer.serialize_none(),
            GeneratedValue::Bool(value) => serializer.serialize_bool(*value),
            GeneratedValue::Int(value) => serializer.serialize_i64(*value),
            GeneratedValue::Float(value) => serializer.serialize_f64(*value),
            GeneratedValue::Json(value) => value.serialize(serializer),
            other => serializer.serialize_str(&other.to_text()),
        }
    }
}

/// One generated record: column values in assignment order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, GeneratedValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&GeneratedValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Set a column, keeping its position when it already exists.
    pub fn set(&mut self, column: impl Into<String>, value: GeneratedValue) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<GeneratedValue>) -> Self {
        self.set(column, value.into());
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GeneratedValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, GeneratedValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, GeneratedValue)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in &self.columns {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
