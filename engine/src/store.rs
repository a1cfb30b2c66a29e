//! Collection store - CRUD over one collection through its adapter.
//!
//! The store validates payloads against the collection schema, stamps
//! timestamps, bounds every adapter call with a timeout and guards against two
//! saves of the same record running at once.

use crate::schema::CollectionSchema;
use crate::{error::Result, Adapter, Batch, Criteria, Error, Fields, Record, RecordId};
use chrono::Utc;
use dashmap::DashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single adapter call.
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage for the records of one collection.
pub struct CollectionStore {
    schema: CollectionSchema,
    adapter: Arc<dyn Adapter>,
    timeout: Duration,
    saving: DashSet<RecordId>,
}

impl std::fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionStore")
            .field("identity", &self.schema.identity)
            .field("adapter", &self.adapter.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CollectionStore {
    pub fn new(schema: CollectionSchema, adapter: Arc<dyn Adapter>, timeout: Duration) -> Self {
        Self {
            schema,
            adapter,
            timeout,
            saving: DashSet::new(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.schema.identity
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// All records matching the criteria.
    pub async fn find(&self, criteria: &Criteria) -> Result<Vec<Record>> {
        self.schema.validate_criteria_keys(criteria.keys())?;
        self.call("find", self.adapter.find(self.identity(), criteria))
            .await
    }

    /// Exactly one record, or [`Error::RecordNotFound`].
    pub async fn find_one(&self, criteria: &Criteria) -> Result<Record> {
        self.schema.validate_criteria_keys(criteria.keys())?;
        self.call("find_one", self.adapter.find_one(self.identity(), criteria))
            .await?
            .ok_or_else(|| Error::RecordNotFound {
                collection: self.identity().to_string(),
                criteria: criteria.to_string(),
            })
    }

    /// Look up a record by id without treating a miss as an error.
    pub async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        self.call(
            "find_one",
            self.adapter.find_one(self.identity(), &Criteria::by_id(id)),
        )
        .await
    }

    /// Validate and store a new record.
    pub async fn create(&self, payload: &Fields) -> Result<Record> {
        let fields = self.schema.validate_create(payload)?;
        let record = self
            .call(
                "create",
                self.adapter.create(self.identity(), fields, Utc::now()),
            )
            .await?;
        tracing::debug!(collection = %self.identity(), id = record.id, "created record");
        Ok(record)
    }

    /// Apply a partial update to every match. An `id` in the payload is ignored.
    pub async fn update(&self, criteria: &Criteria, payload: &Fields) -> Result<Vec<Record>> {
        self.schema.validate_criteria_keys(criteria.keys())?;
        let fields = self.schema.validate_update(payload)?;
        let updated = self
            .call(
                "update",
                self.adapter
                    .update(self.identity(), criteria, fields, Utc::now()),
            )
            .await?;
        tracing::debug!(
            collection = %self.identity(),
            %criteria,
            count = updated.len(),
            "updated records"
        );
        Ok(updated)
    }

    /// Remove every match. Join entries pointing at removed records are left
    /// in place and pruned by the next populate.
    pub async fn destroy(&self, criteria: &Criteria) -> Result<u64> {
        self.schema.validate_criteria_keys(criteria.keys())?;
        let count = self
            .call("destroy", self.adapter.destroy(self.identity(), criteria))
            .await?;
        tracing::debug!(collection = %self.identity(), %criteria, count, "destroyed records");
        Ok(count)
    }

    /// Write a record's scalar fields back, returning the stored state.
    pub async fn persist(&self, record: &Record) -> Result<Record> {
        let fields = self.schema.validate_create(&record.fields)?;
        self.call(
            "update",
            self.adapter
                .update(self.identity(), &Criteria::by_id(record.id), fields, Utc::now()),
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::RecordNotFound {
            collection: self.identity().to_string(),
            criteria: Criteria::by_id(record.id).to_string(),
        })
    }

    /// Apply a batch of inserts and deletes atomically.
    pub async fn commit(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let (inserts, deletes) = (batch.inserts.len(), batch.deletes.len());
        self.call(
            "commit",
            self.adapter.commit(self.identity(), batch, Utc::now()),
        )
        .await?;
        tracing::debug!(collection = %self.identity(), inserts, deletes, "committed batch");
        Ok(())
    }

    /// Claim the right to save record `id` until the guard is dropped.
    pub fn begin_save(&self, id: RecordId) -> Result<SaveGuard<'_>> {
        if !self.saving.insert(id) {
            tracing::warn!(collection = %self.identity(), id, "rejected concurrent save");
            return Err(Error::ConcurrentSave {
                collection: self.identity().to_string(),
                id,
            });
        }
        Ok(SaveGuard { store: self, id })
    }

    async fn call<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.inspect_err(|e| {
                tracing::warn!(
                    collection = %self.identity(),
                    adapter = %self.adapter.name(),
                    op,
                    error = %e,
                    "adapter call failed"
                );
            }),
            Err(_) => {
                tracing::warn!(
                    collection = %self.identity(),
                    adapter = %self.adapter.name(),
                    op,
                    "adapter call timed out"
                );
                Err(Error::Timeout {
                    adapter: self.adapter.name().to_string(),
                    millis: self.timeout.as_millis() as u64,
                })
            }
        }
    }
}

/// Marks a record as being saved; releases it on drop.
#[derive(Debug)]
pub struct SaveGuard<'a> {
    store: &'a CollectionStore,
    id: RecordId,
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.store.saving.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType};
    use crate::{MemoryAdapter, MigratePolicy};
    use async_trait::async_trait;
    use serde_json::json;

    fn pet_schema() -> CollectionSchema {
        CollectionSchema::new(
            "pet",
            "memory",
            vec![
                FieldDef::required("name", FieldType::String).into(),
                FieldDef::optional("breed", FieldType::String).into(),
            ],
        )
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn test_store() -> CollectionStore {
        let adapter = Arc::new(MemoryAdapter::default());
        adapter
            .register(&pet_schema(), MigratePolicy::Alter)
            .await
            .unwrap();
        CollectionStore::new(pet_schema(), adapter, DEFAULT_ADAPTER_TIMEOUT)
    }

    #[tokio::test]
    async fn create_then_find_one() {
        let store = test_store().await;
        let rex = store.create(&fields(json!({"name": "Rex"}))).await.unwrap();

        assert_eq!(rex.id, 1);
        assert_eq!(rex.created_at, rex.updated_at);
        let found = store.find_one(&Criteria::by_id(rex.id)).await.unwrap();
        assert_eq!(found, rex);
    }

    #[tokio::test]
    async fn create_validates() {
        let store = test_store().await;
        let result = store.create(&fields(json!({"breed": "pug"}))).await;
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "name"));
    }

    #[tokio::test]
    async fn find_one_missing_is_not_found() {
        let store = test_store().await;
        let result = store.find_one(&Criteria::by_id(9)).await;
        assert!(matches!(result, Err(Error::RecordNotFound { .. })));
    }

    #[tokio::test]
    async fn update_ignores_id() {
        let store = test_store().await;
        let rex = store.create(&fields(json!({"name": "Rex"}))).await.unwrap();

        let updated = store
            .update(
                &Criteria::by_id(rex.id),
                &fields(json!({"id": 50, "breed": "pug"})),
            )
            .await
            .unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].id, rex.id);
        assert_eq!(updated[0].get("breed"), Some(&json!("pug")));
        assert!(store.get(50).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn destroy_counts_matches() {
        let store = test_store().await;
        for name in ["Rex", "Rex", "Fido"] {
            store.create(&fields(json!({ "name": name }))).await.unwrap();
        }

        let removed = store
            .destroy(&Criteria::new().with("name", "Rex"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.find(&Criteria::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_criteria_field() {
        let store = test_store().await;
        let result = store.find(&Criteria::new().with("color", "red")).await;
        assert!(matches!(result, Err(Error::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn save_guard_rejects_second_claim() {
        let store = test_store().await;

        let guard = store.begin_save(1).unwrap();
        assert!(matches!(
            store.begin_save(1),
            Err(Error::ConcurrentSave { id: 1, .. })
        ));
        assert!(store.begin_save(2).is_ok());

        drop(guard);
        assert!(store.begin_save(1).is_ok());
    }

    struct StalledAdapter;

    #[async_trait]
    impl Adapter for StalledAdapter {
        fn name(&self) -> &str {
            "stalled"
        }
        async fn register(&self, _: &CollectionSchema, _: MigratePolicy) -> Result<()> {
            Ok(())
        }
        async fn find(&self, _: &str, _: &Criteria) -> Result<Vec<Record>> {
            std::future::pending().await
        }
        async fn create(&self, _: &str, _: Fields, _: crate::Timestamp) -> Result<Record> {
            std::future::pending().await
        }
        async fn update(
            &self,
            _: &str,
            _: &Criteria,
            _: Fields,
            _: crate::Timestamp,
        ) -> Result<Vec<Record>> {
            std::future::pending().await
        }
        async fn destroy(&self, _: &str, _: &Criteria) -> Result<u64> {
            std::future::pending().await
        }
        async fn commit(&self, _: &str, _: Batch, _: crate::Timestamp) -> Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_adapter_times_out() {
        let store = CollectionStore::new(
            pet_schema(),
            Arc::new(StalledAdapter),
            Duration::from_millis(20),
        );

        let result = store.find(&Criteria::new()).await;
        assert!(matches!(
            result,
            Err(Error::Timeout { ref adapter, millis: 20 }) if adapter == "stalled"
        ));
    }
}
