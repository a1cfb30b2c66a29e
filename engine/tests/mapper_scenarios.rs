//! End-to-end scenarios for kennel-engine
//!
//! A `user` collection on one adapter and a `pet` collection on another,
//! joined by `user.pets <-> pet.owners` with `user` dominant.

use kennel_engine::{
    Adapter, AssociationDef, CollectionSchema, Criteria, DiskAdapter, Error, ErrorKind, FieldDef,
    FieldType, Fields, MemoryAdapter, MigratePolicy, Orm, Record, RecordId,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn user_schema() -> CollectionSchema {
    CollectionSchema::new(
        "user",
        "myLocalDisk",
        vec![
            FieldDef::optional("first_name", FieldType::String).into(),
            FieldDef::optional("last_name", FieldType::String).into(),
            AssociationDef::new("pets", "pet", "owners").dominant().into(),
        ],
    )
}

fn pet_schema() -> CollectionSchema {
    CollectionSchema::new(
        "pet",
        "myLocalPostgres",
        vec![
            FieldDef::optional("name", FieldType::String).into(),
            FieldDef::optional("breed", FieldType::String).into(),
            AssociationDef::new("owners", "user", "pets").into(),
        ],
    )
}

async fn build(user_adapter: Arc<dyn Adapter>, pet_adapter: Arc<dyn Adapter>) -> Orm {
    Orm::builder()
        .connection("myLocalDisk", user_adapter)
        .connection("myLocalPostgres", pet_adapter)
        .collection(user_schema())
        .collection(pet_schema())
        .build()
        .await
        .unwrap()
}

async fn memory_orm() -> Orm {
    build(
        Arc::new(MemoryAdapter::new("disk")),
        Arc::new(MemoryAdapter::new("postgres")),
    )
    .await
}

async fn disk_orm(path: &Path, pets: Arc<dyn Adapter>) -> Orm {
    let disk = DiskAdapter::open("disk", path).await.unwrap();
    build(Arc::new(disk), pets).await
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

async fn create(orm: &Orm, collection: &str, value: serde_json::Value) -> Record {
    orm.collection(collection)
        .unwrap()
        .create(&fields(value))
        .await
        .unwrap()
}

async fn populated_ids(orm: &Orm, record: &Record, field: &str) -> Vec<RecordId> {
    orm.populate(record.clone(), field)
        .await
        .unwrap()
        .populated(field)
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect()
}

// ============================================================================
// Joining and populating
// ============================================================================

#[tokio::test]
async fn jo_adopts_rex() {
    let orm = memory_orm().await;

    let mut jo = create(&orm, "user", json!({"first_name": "Jo"})).await;
    let rex = create(&orm, "pet", json!({"name": "Rex"})).await;
    assert_eq!(jo.id, 1);
    assert_eq!(rex.id, 1);

    orm.add(&mut jo, "pets", rex.id).unwrap();
    orm.save(&mut jo).await.unwrap();

    let jo = orm.populate(jo, "pets").await.unwrap();
    let pets = jo.populated("pets").unwrap();
    assert_eq!(pets.len(), 1);
    assert_eq!(pets[0].id, 1);
    assert_eq!(pets[0].get("name"), Some(&json!("Rex")));

    let body = serde_json::to_value(&jo).unwrap();
    assert_eq!(body["first_name"], "Jo");
    assert_eq!(body["pets"][0]["name"], "Rex");
    assert!(body["createdAt"].is_string());
    assert!(body["pets"][0]["updatedAt"].is_string());
}

#[tokio::test]
async fn destroyed_pet_disappears_from_populate() {
    let orm = memory_orm().await;
    let mut jo = create(&orm, "user", json!({"first_name": "Jo"})).await;
    let rex = create(&orm, "pet", json!({"name": "Rex"})).await;
    orm.add(&mut jo, "pets", rex.id).unwrap();
    orm.save(&mut jo).await.unwrap();

    orm.collection("pet")
        .unwrap()
        .destroy(&Criteria::by_id(rex.id))
        .await
        .unwrap();

    assert!(populated_ids(&orm, &jo, "pets").await.is_empty());

    let junction = orm.junction("pet_owners__user_pets").unwrap();
    let entries = junction.find(&Criteria::new()).await.unwrap();
    assert!(entries.is_empty(), "dangling join entry should be pruned");
}

#[tokio::test]
async fn add_new_payload_creates_the_pet() {
    let orm = memory_orm().await;
    let mut jo = create(&orm, "user", json!({"first_name": "Jo"})).await;

    orm.add(&mut jo, "pets", fields(json!({"name": "NewPet"})))
        .unwrap();
    orm.save(&mut jo).await.unwrap();

    let pets = orm
        .collection("pet")
        .unwrap()
        .find(&Criteria::new().with("name", "NewPet"))
        .await
        .unwrap();
    assert_eq!(pets.len(), 1);
    assert_eq!(populated_ids(&orm, &jo, "pets").await, vec![pets[0].id]);
}

#[tokio::test]
async fn remove_then_save_unlinks() {
    let orm = memory_orm().await;
    let mut jo = create(&orm, "user", json!({"first_name": "Jo"})).await;
    let rex = create(&orm, "pet", json!({"name": "Rex"})).await;
    let fido = create(&orm, "pet", json!({"name": "Fido"})).await;

    orm.add(&mut jo, "pets", rex.id).unwrap();
    orm.add(&mut jo, "pets", fido.id).unwrap();
    orm.save(&mut jo).await.unwrap();
    assert_eq!(populated_ids(&orm, &jo, "pets").await, vec![rex.id, fido.id]);

    orm.remove(&mut jo, "pets", rex.id).unwrap();
    orm.save(&mut jo).await.unwrap();
    assert_eq!(populated_ids(&orm, &jo, "pets").await, vec![fido.id]);

    // the pet itself is untouched
    assert!(orm.collection("pet").unwrap().get(rex.id).await.unwrap().is_some());
}

#[tokio::test]
async fn non_dominant_side_sees_same_edges() {
    let orm = memory_orm().await;
    let mut jo = create(&orm, "user", json!({"first_name": "Jo"})).await;
    let mut al = create(&orm, "user", json!({"first_name": "Al"})).await;
    let rex = create(&orm, "pet", json!({"name": "Rex"})).await;

    orm.add(&mut jo, "pets", rex.id).unwrap();
    orm.save(&mut jo).await.unwrap();
    orm.add(&mut al, "pets", rex.id).unwrap();
    orm.save(&mut al).await.unwrap();

    assert_eq!(populated_ids(&orm, &rex, "owners").await, vec![jo.id, al.id]);
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn reference_error_leaves_no_joins() {
    let orm = memory_orm().await;
    let mut jo = create(&orm, "user", json!({"first_name": "Jo"})).await;
    let rex = create(&orm, "pet", json!({"name": "Rex"})).await;

    orm.add(&mut jo, "pets", rex.id).unwrap();
    orm.add(&mut jo, "pets", 99_i64).unwrap();

    let err = orm.save(&mut jo).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Reference);

    let junction = orm.junction("pet_owners__user_pets").unwrap();
    assert!(junction.find(&Criteria::new()).await.unwrap().is_empty());
    assert_eq!(jo.staged().len(), 2);
}

#[tokio::test]
async fn concurrent_save_is_rejected() {
    let orm = memory_orm().await;
    let mut jo = create(&orm, "user", json!({"first_name": "Jo"})).await;
    let rex = create(&orm, "pet", json!({"name": "Rex"})).await;
    orm.add(&mut jo, "pets", rex.id).unwrap();

    let in_flight = orm.collection("user").unwrap().begin_save(jo.id).unwrap();
    let result = orm.save(&mut jo).await;
    assert!(matches!(result, Err(Error::ConcurrentSave { id: 1, .. })));
    assert!(jo.has_staged());

    drop(in_flight);
    orm.save(&mut jo).await.unwrap();
    assert_eq!(populated_ids(&orm, &jo, "pets").await, vec![rex.id]);
}

#[tokio::test]
async fn update_keeps_identifier() {
    let orm = memory_orm().await;
    let rex = create(&orm, "pet", json!({"name": "Rex"})).await;

    let updated = orm
        .collection("pet")
        .unwrap()
        .update(
            &Criteria::by_id(rex.id),
            &fields(json!({"id": 7, "breed": "pug"})),
        )
        .await
        .unwrap();

    assert_eq!(updated[0].id, rex.id);
    assert_eq!(updated[0].get("breed"), Some(&json!("pug")));
    assert_eq!(updated[0].created_at, rex.created_at);
}

// ============================================================================
// Disk persistence
// ============================================================================

#[tokio::test]
async fn disk_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("localDiskDb.db");
    let pets: Arc<dyn Adapter> = Arc::new(MemoryAdapter::new("postgres"));

    let orm = disk_orm(&path, pets.clone()).await;
    let mut jo = create(&orm, "user", json!({"first_name": "Jo"})).await;
    let rex = create(&orm, "pet", json!({"name": "Rex"})).await;
    orm.add(&mut jo, "pets", rex.id).unwrap();
    orm.save(&mut jo).await.unwrap();
    drop(orm);

    let orm = disk_orm(&path, pets).await;
    let jo = orm.query("user").filter(Criteria::by_id(1)).populate("pets").one().await.unwrap();
    assert_eq!(jo.get("first_name"), Some(&json!("Jo")));
    assert_eq!(jo.populated("pets").unwrap()[0].id, rex.id);
}

#[tokio::test]
async fn drop_policy_discards_disk_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("localDiskDb.db");

    let orm = disk_orm(&path, Arc::new(MemoryAdapter::new("postgres"))).await;
    create(&orm, "user", json!({"first_name": "Jo"})).await;
    drop(orm);

    let disk = DiskAdapter::open("disk", &path).await.unwrap();
    let orm = Orm::builder()
        .connection("myLocalDisk", Arc::new(disk))
        .connection("myLocalPostgres", Arc::new(MemoryAdapter::new("postgres")))
        .collection(user_schema())
        .collection(pet_schema())
        .migrate(MigratePolicy::Drop)
        .build()
        .await
        .unwrap();

    assert!(orm.query("user").all().await.unwrap().is_empty());
    let fresh = create(&orm, "user", json!({"first_name": "Al"})).await;
    assert_eq!(fresh.id, 1);
}
