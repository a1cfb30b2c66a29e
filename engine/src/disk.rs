//! File-backed adapter.
//!
//! All collections of one adapter are kept in memory and rewritten to a single
//! JSON file after every mutation. A write goes to a sibling temp file first
//! and is renamed over the target, so a crash never leaves a torn file.
//!
//! A mutation is applied to a copy of its table and only swapped in once the
//! file is written. It runs on its own task holding the write lock, so a caller
//! that stops waiting (for example on a store timeout) never leaves memory and
//! file disagreeing: the change either lands in both or in neither.

use crate::schema::CollectionSchema;
use crate::snapshot::DiskSnapshot;
use crate::table::{table, Table};
use crate::{
    error::Result, Adapter, Batch, CollectionName, Criteria, Error, Fields, MigratePolicy, Record,
    Timestamp,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

type Tables = BTreeMap<CollectionName, Table>;

/// An adapter persisting its collections to one JSON file.
#[derive(Debug)]
pub struct DiskAdapter {
    name: String,
    path: PathBuf,
    tables: Arc<RwLock<Tables>>,
}

impl DiskAdapter {
    /// Open the store at `path`, loading existing data if the file exists.
    pub async fn open(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let name = name.into();
        let path = path.into();

        let tables = match tokio::fs::read_to_string(&path).await {
            Ok(json) => DiskSnapshot::from_json(&json)?.collections,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::adapter(&name, e)),
        };

        tracing::debug!(
            adapter = %name,
            path = %path.display(),
            collections = tables.len(),
            "opened disk store"
        );

        Ok(Self {
            name,
            path,
            tables: Arc::new(RwLock::new(tables)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `change` against a copy of one table, persist the result and swap
    /// the copy in. On a failed write the stored table is left untouched.
    async fn mutate<T, F>(&self, collection: &str, change: F) -> Result<T>
    where
        F: FnOnce(&mut Table) -> T + Send + 'static,
        T: Send + 'static,
    {
        // Taken before spawning: once this returns, every later reader waits
        // for the mutation to finish.
        let mut tables = Arc::clone(&self.tables).write_owned().await;
        let name = self.name.clone();
        let path = self.path.clone();
        let collection = collection.to_string();

        let task = tokio::spawn(async move {
            let mut next = table(&tables, &collection)?.clone();
            let out = change(&mut next);

            let json = DiskSnapshot::encode(tables.iter().map(|(key, stored)| {
                let t = if *key == collection { &next } else { stored };
                (key.as_str(), t)
            }))?;
            if let Err(e) = write_file(&name, &path, json).await {
                tracing::error!(
                    adapter = %name,
                    error = %e,
                    "disk write failed, change discarded"
                );
                return Err(e);
            }

            tables.insert(collection, next);
            Ok::<_, Error>(out)
        });

        task.await.map_err(|e| Error::adapter(&self.name, e))?
    }
}

/// Replace the file at `path` with `json` through a temp file and a rename.
async fn write_file(name: &str, path: &Path, json: String) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::adapter(name, e))?;
    }

    let mut tmp = path.to_path_buf().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| Error::adapter(name, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::adapter(name, e))
}

#[async_trait]
impl Adapter for DiskAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn register(&self, schema: &CollectionSchema, policy: MigratePolicy) -> Result<()> {
        let mut tables = self.tables.write().await;
        let name = &schema.identity;

        let mut next = match policy {
            MigratePolicy::Safe => {
                // Safe never writes; a missing collection only exists in memory
                // until the first mutation persists it.
                tables
                    .entry(name.clone())
                    .or_insert_with(|| Table::new(name.clone()));
                return Ok(());
            }
            MigratePolicy::Alter if tables.contains_key(name) => return Ok(()),
            MigratePolicy::Alter | MigratePolicy::Drop => tables.clone(),
        };

        next.insert(name.clone(), Table::new(name.clone()));
        let json = DiskSnapshot::encode(next.iter().map(|(k, t)| (k.as_str(), t)))?;
        write_file(&self.name, &self.path, json).await?;
        *tables = next;
        Ok(())
    }

    async fn find(&self, collection: &str, criteria: &Criteria) -> Result<Vec<Record>> {
        let tables = self.tables.read().await;
        Ok(table(&tables, collection)?.find(criteria))
    }

    async fn create(&self, collection: &str, fields: Fields, at: Timestamp) -> Result<Record> {
        self.mutate(collection, move |t| t.insert(fields, at)).await
    }

    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        fields: Fields,
        at: Timestamp,
    ) -> Result<Vec<Record>> {
        let criteria = criteria.clone();
        self.mutate(collection, move |t| t.update(&criteria, &fields, at))
            .await
    }

    async fn destroy(&self, collection: &str, criteria: &Criteria) -> Result<u64> {
        let criteria = criteria.clone();
        self.mutate(collection, move |t| t.destroy(&criteria)).await
    }

    async fn commit(&self, collection: &str, batch: Batch, at: Timestamp) -> Result<()> {
        self.mutate(collection, move |t| t.apply(batch, at)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType};
    use crate::store::CollectionStore;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn user_schema() -> CollectionSchema {
        CollectionSchema::new(
            "user",
            "disk",
            vec![FieldDef::optional("first_name", FieldType::String).into()],
        )
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.json");

        let adapter = DiskAdapter::open("disk", &path).await.unwrap();
        adapter
            .register(&user_schema(), MigratePolicy::Alter)
            .await
            .unwrap();
        let jo = adapter
            .create("user", fields(json!({"first_name": "Jo"})), Utc::now())
            .await
            .unwrap();
        drop(adapter);

        let reopened = DiskAdapter::open("disk", &path).await.unwrap();
        reopened
            .register(&user_schema(), MigratePolicy::Alter)
            .await
            .unwrap();
        let found = reopened
            .find_one("user", &Criteria::by_id(jo.id))
            .await
            .unwrap();
        assert_eq!(found, Some(jo));

        let next = reopened
            .create("user", fields(json!({"first_name": "Al"})), Utc::now())
            .await
            .unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn drop_policy_clears_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let adapter = DiskAdapter::open("disk", &path).await.unwrap();
        adapter
            .register(&user_schema(), MigratePolicy::Alter)
            .await
            .unwrap();
        adapter
            .create("user", fields(json!({"first_name": "Jo"})), Utc::now())
            .await
            .unwrap();
        drop(adapter);

        let reopened = DiskAdapter::open("disk", &path).await.unwrap();
        reopened
            .register(&user_schema(), MigratePolicy::Drop)
            .await
            .unwrap();
        assert!(reopened
            .find("user", &Criteria::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn safe_policy_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let adapter = DiskAdapter::open("disk", &path).await.unwrap();
        adapter
            .register(&user_schema(), MigratePolicy::Safe)
            .await
            .unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{ nope").unwrap();

        let result = DiskAdapter::open("disk", &path).await;
        assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
    }

    #[tokio::test]
    async fn failed_write_discards_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let adapter = DiskAdapter::open("disk", &path).await.unwrap();
        adapter
            .register(&user_schema(), MigratePolicy::Alter)
            .await
            .unwrap();
        adapter
            .create("user", fields(json!({"first_name": "Jo"})), Utc::now())
            .await
            .unwrap();

        // A directory in place of the temp file makes the next write fail.
        let tmp = dir.path().join("db.json.tmp");
        std::fs::create_dir(&tmp).unwrap();

        let result = adapter
            .create("user", fields(json!({"first_name": "Al"})), Utc::now())
            .await;
        assert!(matches!(result, Err(Error::Adapter { .. })));

        let result = adapter
            .update(
                "user",
                &Criteria::by_id(1),
                fields(json!({"first_name": "Joe"})),
                Utc::now(),
            )
            .await;
        assert!(result.is_err());

        let users = adapter.find("user", &Criteria::new()).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].get("first_name"), Some(&json!("Jo")));

        std::fs::remove_dir(&tmp).unwrap();
        let al = adapter
            .create("user", fields(json!({"first_name": "Al"})), Utc::now())
            .await
            .unwrap();
        assert_eq!(al.id, 2);

        let reopened = DiskAdapter::open("disk", &path).await.unwrap();
        reopened
            .register(&user_schema(), MigratePolicy::Safe)
            .await
            .unwrap();
        assert_eq!(
            reopened.find("user", &Criteria::new()).await.unwrap(),
            adapter.find("user", &Criteria::new()).await.unwrap()
        );
    }

    #[tokio::test]
    async fn timed_out_write_lands_in_memory_and_file_together() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let adapter = Arc::new(DiskAdapter::open("disk", &path).await.unwrap());
        adapter
            .register(&user_schema(), MigratePolicy::Alter)
            .await
            .unwrap();
        let batch = Batch {
            inserts: (0..50_000)
                .map(|i| fields(json!({ "first_name": format!("user_{i}") })))
                .collect(),
            deletes: Vec::new(),
        };
        adapter.commit("user", batch, Utc::now()).await.unwrap();

        let hasty = CollectionStore::new(
            user_schema(),
            adapter.clone(),
            Duration::from_millis(1),
        );
        let result = hasty.create(&fields(json!({"first_name": "Ghost"}))).await;
        assert!(matches!(result, Ok(_) | Err(Error::Timeout { .. })));

        // Reads wait for the write still running in the background.
        let ghost = Criteria::new().with("first_name", "Ghost");
        let in_memory = adapter.find("user", &ghost).await.unwrap();
        assert_eq!(in_memory.len(), 1);

        let reopened = DiskAdapter::open("disk", &path).await.unwrap();
        reopened
            .register(&user_schema(), MigratePolicy::Safe)
            .await
            .unwrap();
        assert_eq!(reopened.find("user", &ghost).await.unwrap(), in_memory);
    }
}
