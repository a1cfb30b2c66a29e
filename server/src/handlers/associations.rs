//! Association handlers - staging joins and saving them.

use crate::error::{AppError, Result};
use kennel_engine::{Criteria, Orm, Record, RecordId, Related};
use serde_json::Value;

use super::StatusResponse;

/// Join `related` to record `id` through `field`, save, and return the record
/// with `field` populated.
///
/// `body` is a related record id, an object with an `id`, or a new record
/// payload to create in the related collection.
pub async fn add_related(
    orm: &Orm,
    collection: &str,
    id: RecordId,
    field: &str,
    body: Value,
) -> Result<Record> {
    let related = Related::from_value(body).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut record = orm
        .collection(collection)?
        .find_one(&Criteria::by_id(id))
        .await?;
    orm.add(&mut record, field, related)?;
    orm.save(&mut record).await?;

    Ok(orm.populate(record, field).await?)
}

/// Demo wiring: user 1 owns pets 1 and 2, user 2 owns pet 2.
pub async fn connect_pets(orm: &Orm) -> Result<StatusResponse> {
    let users = orm.collection("user")?;

    for (user, pets) in [(1, vec![1_i64, 2]), (2, vec![2])] {
        let mut record = users.find_one(&Criteria::by_id(user)).await?;
        for pet in pets {
            orm.add(&mut record, "pets", pet)?;
        }
        orm.save(&mut record).await?;
    }

    tracing::info!("connected demo pets");
    Ok(StatusResponse::success())
}
