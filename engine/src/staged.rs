//! Staged association changes.
//!
//! Association edits are not written immediately. They are queued on the
//! owning record and persisted together by the next save.

use crate::{error::Result, Error, Fields, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The target of an association add: an existing record or a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Related {
    /// Join an existing record by id
    Id(RecordId),
    /// Create this payload in the related collection, then join it
    New(Fields),
}

impl Related {
    /// Interpret a request body as an add target.
    ///
    /// Accepts a bare id, an object carrying an `id`, or a new record payload.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Related::Id)
                .ok_or_else(|| Error::InvalidPayload(format!("{n} is not a record id"))),
            Value::Object(obj) => match obj.get("id") {
                Some(Value::Null) | None => Ok(Related::New(obj)),
                Some(id) => id.as_i64().map(Related::Id).ok_or_else(|| {
                    Error::InvalidPayload(format!("{id} is not a record id"))
                }),
            },
            other => Err(Error::InvalidPayload(format!(
                "expected a record id or object, got {other}"
            ))),
        }
    }
}

impl From<RecordId> for Related {
    fn from(id: RecordId) -> Self {
        Related::Id(id)
    }
}

impl From<Fields> for Related {
    fn from(fields: Fields) -> Self {
        Related::New(fields)
    }
}

/// A pending association edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StagedChange {
    Add { field: String, related: Related },
    Remove { field: String, id: RecordId },
}

impl StagedChange {
    /// Association attribute this change applies to.
    pub fn field(&self) -> &str {
        match self {
            StagedChange::Add { field, .. } => field,
            StagedChange::Remove { field, .. } => field,
        }
    }
}
