//! The `user` and `pet` collections and the connections they live on.

use kennel_engine::{
    error::Result, Adapter, AssociationDef, CollectionSchema, FieldDef, FieldType, MigratePolicy,
    Orm,
};
use std::sync::Arc;
use std::time::Duration;

/// Connection holding `user` and the user/pet join collection.
pub const DISK_CONNECTION: &str = "myLocalDisk";
/// Connection holding `pet`.
pub const POSTGRES_CONNECTION: &str = "myLocalPostgres";

pub fn user() -> CollectionSchema {
    CollectionSchema::new(
        "user",
        DISK_CONNECTION,
        vec![
            FieldDef::optional("first_name", FieldType::String).into(),
            FieldDef::optional("last_name", FieldType::String).into(),
            AssociationDef::new("pets", "pet", "owners").dominant().into(),
        ],
    )
}

pub fn pet() -> CollectionSchema {
    CollectionSchema::new(
        "pet",
        POSTGRES_CONNECTION,
        vec![
            FieldDef::optional("name", FieldType::String).into(),
            FieldDef::optional("breed", FieldType::String).into(),
            AssociationDef::new("owners", "user", "pets").into(),
        ],
    )
}

/// Build the mapper over the two connections.
pub async fn connect(
    disk: Arc<dyn Adapter>,
    postgres: Arc<dyn Adapter>,
    migrate: MigratePolicy,
    timeout: Duration,
) -> Result<Orm> {
    Orm::builder()
        .connection(DISK_CONNECTION, disk)
        .connection(POSTGRES_CONNECTION, postgres)
        .collection(user())
        .collection(pet())
        .migrate(migrate)
        .timeout(timeout)
        .build()
        .await
}
