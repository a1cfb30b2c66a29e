//! The mapper context.
//!
//! An [`Orm`] is built once at startup from a schema and a set of named
//! connections, and then shared (usually behind an `Arc`) by everything that
//! needs to reach the collections.

use crate::association::{Association, Associations};
use crate::schema::{CollectionSchema, Schema};
use crate::store::DEFAULT_ADAPTER_TIMEOUT;
use crate::{
    error::Result, Adapter, CollectionName, CollectionStore, Error, MigratePolicy, Query,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Collections, their stores and the resolved associations between them.
#[derive(Debug)]
pub struct Orm {
    schema: Schema,
    associations: Associations,
    stores: HashMap<CollectionName, CollectionStore>,
    junctions: HashMap<CollectionName, CollectionStore>,
}

impl Orm {
    pub fn builder() -> OrmBuilder {
        OrmBuilder::default()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The store of a declared collection.
    pub fn collection(&self, identity: &str) -> Result<&CollectionStore> {
        self.stores
            .get(identity)
            .ok_or_else(|| Error::CollectionNotFound(identity.to_string()))
    }

    /// The store holding the join entries of an association pair.
    pub fn junction(&self, name: &str) -> Result<&CollectionStore> {
        self.junctions
            .get(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// The association declared as `field` on `collection`.
    pub fn association(&self, collection: &str, field: &str) -> Result<&Association> {
        self.associations.get(collection, field)
    }

    /// Start a chained find on a collection.
    pub fn query(&self, identity: impl Into<CollectionName>) -> Query<'_> {
        Query::new(self, identity.into())
    }
}

/// Assembles an [`Orm`]: connections first, then collections, then `build`.
#[derive(Default)]
pub struct OrmBuilder {
    schema: Schema,
    connections: HashMap<String, Arc<dyn Adapter>>,
    policy: MigratePolicy,
    timeout: Option<Duration>,
}

impl OrmBuilder {
    /// Register an adapter under a connection name.
    pub fn connection(mut self, name: impl Into<String>, adapter: Arc<dyn Adapter>) -> Self {
        self.connections.insert(name.into(), adapter);
        self
    }

    pub fn collection(mut self, schema: CollectionSchema) -> Self {
        self.schema.add_collection(schema);
        self
    }

    pub fn migrate(mut self, policy: MigratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bound every adapter call made by the stores.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate the schema, resolve associations and register every
    /// collection and join collection with its adapter.
    pub async fn build(self) -> Result<Orm> {
        self.schema.validate()?;
        let associations = Associations::resolve(&self.schema)?;
        let timeout = self.timeout.unwrap_or(DEFAULT_ADAPTER_TIMEOUT);

        let mut stores = HashMap::new();
        for schema in self.schema.collections.values() {
            let adapter = self.adapter_for(schema)?;
            adapter.register(schema, self.policy).await?;
            tracing::info!(
                collection = %schema.identity,
                connection = %schema.connection,
                adapter = %adapter.name(),
                "registered collection"
            );
            stores.insert(
                schema.identity.clone(),
                CollectionStore::new(schema.clone(), adapter, timeout),
            );
        }

        let mut junctions = HashMap::new();
        for junction in associations.junctions() {
            let adapter = self.adapter_for(&junction.schema)?;
            adapter.register(&junction.schema, self.policy).await?;
            tracing::info!(
                junction = %junction.name(),
                dominant = %junction.dominant,
                adapter = %adapter.name(),
                "registered join collection"
            );
            junctions.insert(
                junction.name().to_string(),
                CollectionStore::new(junction.schema.clone(), adapter, timeout),
            );
        }

        Ok(Orm {
            schema: self.schema,
            associations,
            stores,
            junctions,
        })
    }

    fn adapter_for(&self, schema: &CollectionSchema) -> Result<Arc<dyn Adapter>> {
        self.connections
            .get(&schema.connection)
            .cloned()
            .ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "{} uses unknown connection '{}'",
                    schema.identity, schema.connection
                ))
            })
    }
}
