//! The storage capability set every backend implements.

use crate::schema::CollectionSchema;
use crate::{error::Result, Criteria, Error, Fields, Record, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What an adapter may do to existing storage when a collection is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigratePolicy {
    /// Never touch storage layout
    Safe,
    /// Create missing collections and add missing fields
    #[default]
    Alter,
    /// Discard existing data and recreate
    Drop,
}

impl std::str::FromStr for MigratePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "safe" => Ok(MigratePolicy::Safe),
            "alter" => Ok(MigratePolicy::Alter),
            "drop" => Ok(MigratePolicy::Drop),
            other => Err(Error::InvalidSchema(format!(
                "unknown migrate policy '{other}'"
            ))),
        }
    }
}

/// Inserts and deletes applied to one collection as a single unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub inserts: Vec<Fields>,
    pub deletes: Vec<Criteria>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }
}

/// A storage backend.
///
/// Adapters store already validated scalar fields and assign record ids. They
/// know nothing about associations; join entries are ordinary records of a
/// join collection.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Adapter name for logging and error reporting.
    fn name(&self) -> &str;

    /// Make a collection available, applying the migrate policy.
    async fn register(&self, schema: &CollectionSchema, policy: MigratePolicy) -> Result<()>;

    /// All records matching the criteria, ordered by id.
    async fn find(&self, collection: &str, criteria: &Criteria) -> Result<Vec<Record>>;

    async fn find_one(&self, collection: &str, criteria: &Criteria) -> Result<Option<Record>> {
        Ok(self.find(collection, criteria).await?.into_iter().next())
    }

    /// Store a new record, assigning the next id.
    async fn create(&self, collection: &str, fields: Fields, at: Timestamp) -> Result<Record>;

    /// Merge `fields` into every matching record and return the updated records.
    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        fields: Fields,
        at: Timestamp,
    ) -> Result<Vec<Record>>;

    /// Remove matching records, returning how many were removed.
    async fn destroy(&self, collection: &str, criteria: &Criteria) -> Result<u64>;

    /// Apply a batch atomically: either every insert and delete lands or none does.
    async fn commit(&self, collection: &str, batch: Batch, at: Timestamp) -> Result<()>;
}
