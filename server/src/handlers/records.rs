//! Record handlers - CRUD shared by every collection route.

use crate::error::{AppError, Result};
use kennel_engine::{Criteria, Fields, Orm, Record, RecordId};
use serde::Serialize;
use serde_json::Value;

/// Response for operations with nothing else to report.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }

    pub fn success() -> Self {
        Self { status: "success" }
    }
}

/// Require a JSON object body.
pub fn into_fields(body: Value) -> Result<Fields> {
    match body {
        Value::Object(fields) => Ok(fields),
        other => Err(AppError::BadRequest(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Every record of a collection, with `populate` attached.
pub async fn list_records(orm: &Orm, collection: &str, populate: &[&str]) -> Result<Vec<Record>> {
    let mut query = orm.query(collection);
    for field in populate {
        query = query.populate(*field);
    }
    Ok(query.all().await?)
}

/// One record by id, with `populate` attached.
pub async fn get_record(
    orm: &Orm,
    collection: &str,
    id: RecordId,
    populate: &[&str],
) -> Result<Record> {
    let mut query = orm.query(collection).filter(Criteria::by_id(id));
    for field in populate {
        query = query.populate(*field);
    }
    Ok(query.one().await?)
}

pub async fn create_record(orm: &Orm, collection: &str, body: Value) -> Result<Record> {
    let fields = into_fields(body)?;
    Ok(orm.collection(collection)?.create(&fields).await?)
}

/// Update one record. An `id` in the body is ignored.
pub async fn update_record(
    orm: &Orm,
    collection: &str,
    id: RecordId,
    body: Value,
) -> Result<Vec<Record>> {
    let fields = into_fields(body)?;
    Ok(orm
        .collection(collection)?
        .update(&Criteria::by_id(id), &fields)
        .await?)
}

pub async fn destroy_record(orm: &Orm, collection: &str, id: RecordId) -> Result<StatusResponse> {
    let removed = orm
        .collection(collection)?
        .destroy(&Criteria::by_id(id))
        .await?;
    tracing::debug!(collection, id, removed, "destroy handled");
    Ok(StatusResponse::ok())
}
