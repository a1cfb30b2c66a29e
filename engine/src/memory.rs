//! Volatile adapter keeping every collection in process memory.

use crate::schema::CollectionSchema;
use crate::table::{table, table_mut, Table};
use crate::{
    error::Result, Adapter, Batch, CollectionName, Criteria, Fields, MigratePolicy, Record,
    Timestamp,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// An adapter whose data lives only as long as the process.
#[derive(Debug)]
pub struct MemoryAdapter {
    name: String,
    tables: RwLock<BTreeMap<CollectionName, Table>>,
}

impl MemoryAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn register(&self, schema: &CollectionSchema, policy: MigratePolicy) -> Result<()> {
        let mut tables = self.tables.write().await;
        let name = &schema.identity;
        match policy {
            MigratePolicy::Drop => {
                tables.insert(name.clone(), Table::new(name.clone()));
            }
            MigratePolicy::Safe | MigratePolicy::Alter => {
                tables
                    .entry(name.clone())
                    .or_insert_with(|| Table::new(name.clone()));
            }
        }
        Ok(())
    }

    async fn find(&self, collection: &str, criteria: &Criteria) -> Result<Vec<Record>> {
        let tables = self.tables.read().await;
        Ok(table(&tables, collection)?.find(criteria))
    }

    async fn create(&self, collection: &str, fields: Fields, at: Timestamp) -> Result<Record> {
        let mut tables = self.tables.write().await;
        Ok(table_mut(&mut tables, collection)?.insert(fields, at))
    }

    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        fields: Fields,
        at: Timestamp,
    ) -> Result<Vec<Record>> {
        let mut tables = self.tables.write().await;
        Ok(table_mut(&mut tables, collection)?.update(criteria, &fields, at))
    }

    async fn destroy(&self, collection: &str, criteria: &Criteria) -> Result<u64> {
        let mut tables = self.tables.write().await;
        Ok(table_mut(&mut tables, collection)?.destroy(criteria))
    }

    async fn commit(&self, collection: &str, batch: Batch, at: Timestamp) -> Result<()> {
        let mut tables = self.tables.write().await;
        table_mut(&mut tables, collection)?.apply(batch, at);
        Ok(())
    }
}
