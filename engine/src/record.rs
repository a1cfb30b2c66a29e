//! Record types for storing data.

use crate::{staged::StagedChange, CollectionName, Fields, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A record as handed out by a collection store.
///
/// Serializes to a flat object: `id`, every scalar field, `createdAt`,
/// `updatedAt` and any populated association.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier within the collection
    pub id: RecordId,
    /// Collection this record belongs to
    #[serde(skip)]
    pub collection: CollectionName,
    /// Scalar field values
    #[serde(flatten)]
    pub fields: Fields,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Associations resolved by populate, keyed by attribute name
    #[serde(flatten)]
    pub populated: BTreeMap<String, Vec<Record>>,
    /// Association changes waiting for the next save
    #[serde(skip)]
    staged: Vec<StagedChange>,
}

impl Record {
    /// Create a new record.
    pub fn new(
        id: RecordId,
        collection: impl Into<CollectionName>,
        fields: Fields,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            collection: collection.into(),
            fields,
            created_at,
            updated_at,
            populated: BTreeMap::new(),
            staged: Vec::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a scalar field. The identifier cannot be changed this way.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field != "id" {
            self.fields.insert(field, value);
        }
    }

    /// Records attached under an association by populate.
    pub fn populated(&self, field: &str) -> Option<&[Record]> {
        self.populated.get(field).map(Vec::as_slice)
    }

    /// Association changes that the next save will persist.
    pub fn staged(&self) -> &[StagedChange] {
        &self.staged
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    pub(crate) fn stage(&mut self, change: StagedChange) {
        self.staged.push(change);
    }

    pub(crate) fn clear_staged(&mut self) {
        self.staged.clear();
    }
}

/// The persisted shape of a record, without collection or association state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: RecordId,
    pub fields: Fields,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StoredRecord {
    pub fn to_record(&self, collection: &str) -> Record {
        Record::new(
            self.id,
            collection,
            self.fields.clone(),
            self.created_at,
            self.updated_at,
        )
    }
}
