//! In-process tables shared by the memory and disk adapters.

use crate::record::StoredRecord;
use crate::{
    error::Result, Batch, CollectionName, Criteria, Error, Fields, Record, RecordId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Records of one collection, keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    name: CollectionName,
    next_id: RecordId,
    records: BTreeMap<RecordId, StoredRecord>,
}

impl Table {
    /// Create an empty table. The first record gets id 1.
    pub fn new(name: impl Into<CollectionName>) -> Self {
        Self {
            name: name.into(),
            next_id: 1,
            records: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, criteria: &Criteria) -> Vec<Record> {
        self.records
            .values()
            .map(|stored| stored.to_record(&self.name))
            .filter(|record| criteria.matches(record))
            .collect()
    }

    pub fn insert(&mut self, fields: Fields, at: Timestamp) -> Record {
        let id = self.next_id;
        self.next_id += 1;

        let stored = StoredRecord {
            id,
            fields,
            created_at: at,
            updated_at: at,
        };
        let record = stored.to_record(&self.name);
        self.records.insert(id, stored);
        record
    }

    pub fn update(&mut self, criteria: &Criteria, fields: &Fields, at: Timestamp) -> Vec<Record> {
        let ids = self.matching_ids(criteria);
        let mut updated = Vec::with_capacity(ids.len());

        for id in ids {
            if let Some(stored) = self.records.get_mut(&id) {
                for (key, value) in fields {
                    stored.fields.insert(key.clone(), value.clone());
                }
                stored.updated_at = at;
                updated.push(stored.to_record(&self.name));
            }
        }

        updated
    }

    pub fn destroy(&mut self, criteria: &Criteria) -> u64 {
        let ids = self.matching_ids(criteria);
        for id in &ids {
            self.records.remove(id);
        }
        ids.len() as u64
    }

    /// Apply a batch. Deletes run before inserts.
    pub fn apply(&mut self, batch: Batch, at: Timestamp) {
        for criteria in &batch.deletes {
            self.destroy(criteria);
        }
        for fields in batch.inserts {
            self.insert(fields, at);
        }
    }

    fn matching_ids(&self, criteria: &Criteria) -> Vec<RecordId> {
        self.records
            .values()
            .filter(|stored| criteria.matches(&stored.to_record(&self.name)))
            .map(|stored| stored.id)
            .collect()
    }
}

/// Look up a registered table.
pub(crate) fn table<'a>(
    tables: &'a BTreeMap<CollectionName, Table>,
    name: &str,
) -> Result<&'a Table> {
    tables
        .get(name)
        .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
}

pub(crate) fn table_mut<'a>(
    tables: &'a mut BTreeMap<CollectionName, Table>,
    name: &str,
) -> Result<&'a mut Table> {
    tables
        .get_mut(name)
        .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn ids_are_sequential_and_never_reused() {
        let mut table = Table::new("pet");
        let now = Utc::now();

        let rex = table.insert(fields(json!({"name": "Rex"})), now);
        let fido = table.insert(fields(json!({"name": "Fido"})), now);
        assert_eq!((rex.id, fido.id), (1, 2));

        table.destroy(&Criteria::by_id(2));
        let max = table.insert(fields(json!({"name": "Max"})), now);
        assert_eq!(max.id, 3);
    }

    #[test]
    fn update_merges_fields() {
        let mut table = Table::new("pet");
        let now = Utc::now();
        table.insert(fields(json!({"name": "Rex", "breed": "pug"})), now);

        let later = now + chrono::Duration::seconds(5);
        let updated = table.update(&Criteria::by_id(1), &fields(json!({"breed": "boxer"})), later);

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].get("name"), Some(&json!("Rex")));
        assert_eq!(updated[0].get("breed"), Some(&json!("boxer")));
        assert_eq!(updated[0].created_at, now);
        assert_eq!(updated[0].updated_at, later);
    }

    #[test]
    fn apply_deletes_then_inserts() {
        let mut table = Table::new("join");
        let now = Utc::now();
        table.insert(fields(json!({"a": 1, "b": 1})), now);

        table.apply(
            Batch {
                inserts: vec![fields(json!({"a": 1, "b": 2}))],
                deletes: vec![Criteria::new().with("a", 1).with("b", 1)],
            },
            now,
        );

        let rows = table.find(&Criteria::new());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("b"), Some(&json!(2)));
    }

    #[test]
    fn find_orders_by_id() {
        let mut table = Table::new("pet");
        let now = Utc::now();
        for name in ["c", "a", "b"] {
            table.insert(fields(json!({ "name": name })), now);
        }
        let ids: Vec<_> = table.find(&Criteria::new()).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
