//! Exact-match filters over record fields.

use crate::{Fields, Record, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An exact-match filter. Every entry must match; an array value matches any
/// of its elements. Empty criteria match every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(Fields);

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria selecting one record by id.
    pub fn by_id(id: RecordId) -> Self {
        Self::new().with("id", id)
    }

    /// Criteria selecting any of the given ids.
    pub fn id_in(ids: impl IntoIterator<Item = RecordId>) -> Self {
        Self::new().with("id", ids.into_iter().collect::<Vec<_>>())
    }

    /// Add a condition.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Check a record against every condition.
    pub fn matches(&self, record: &Record) -> bool {
        self.0.iter().all(|(field, expected)| {
            let id;
            let actual = if field == "id" {
                id = Value::from(record.id);
                &id
            } else {
                record.fields.get(field).unwrap_or(&Value::Null)
            };

            match expected {
                Value::Array(options) => options.iter().any(|o| values_equal(o, actual)),
                single => values_equal(single, actual),
            }
        })
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

impl From<Fields> for Criteria {
    fn from(fields: Fields) -> Self {
        Self(fields)
    }
}

impl std::fmt::Display for Criteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}
