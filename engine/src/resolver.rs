//! Relationship resolution: populate, add, remove and save.
//!
//! Join entries always live in the join collection of the dominant side, so
//! every operation here goes through [`Orm::junction`] no matter which side of
//! the association the caller starts from.
//!
//! A save validates every staged change before writing anything. Related
//! records created from staged payloads are destroyed again if the join batch
//! is rejected. A batch that timed out may still be applied by its adapter, so
//! in that case the created records are kept for the joins to point at.

use crate::association::Association;
use crate::staged::{Related, StagedChange};
use crate::{
    error::Result, Batch, CollectionStore, Criteria, Error, Fields, Orm, Record, RecordId,
};
use std::collections::{BTreeMap, BTreeSet};

/// A staged change that passed validation.
enum Step<'a> {
    Link(&'a Association, RecordId),
    LinkNew(&'a Association, Fields),
    Unlink(&'a Association, RecordId),
}

impl Orm {
    /// Attach the records related through `field` to `record`.
    ///
    /// Join entries whose related record no longer exists are removed from the
    /// join collection.
    pub async fn populate(&self, mut record: Record, field: &str) -> Result<Record> {
        let assoc = self.association(&record.collection, field)?;
        let junction = self.junction(&assoc.junction)?;

        let entries = junction
            .find(&Criteria::new().with(assoc.own_column.clone(), record.id))
            .await?;
        let ids: BTreeSet<RecordId> = entries
            .iter()
            .filter_map(|e| e.get(&assoc.related_column).and_then(|v| v.as_i64()))
            .collect();

        let related = if ids.is_empty() {
            Vec::new()
        } else {
            self.collection(&assoc.related)?
                .find(&Criteria::id_in(ids.iter().copied()))
                .await?
        };

        let found: BTreeSet<RecordId> = related.iter().map(|r| r.id).collect();
        let dangling: Vec<RecordId> = ids.difference(&found).copied().collect();
        if !dangling.is_empty() {
            tracing::warn!(
                collection = %record.collection,
                id = record.id,
                field,
                ?dangling,
                "pruning join entries to missing records"
            );
            junction
                .destroy(
                    &Criteria::new()
                        .with(assoc.own_column.clone(), record.id)
                        .with(assoc.related_column.clone(), dangling),
                )
                .await?;
        }

        record.populated.insert(field.to_string(), related);
        Ok(record)
    }

    /// Stage a join to an existing record id or to a payload that the next
    /// save will create in the related collection.
    pub fn add(&self, record: &mut Record, field: &str, related: impl Into<Related>) -> Result<()> {
        self.association(&record.collection, field)?;
        record.stage(StagedChange::Add {
            field: field.to_string(),
            related: related.into(),
        });
        Ok(())
    }

    /// Stage removal of the join between `record` and related record `id`.
    pub fn remove(&self, record: &mut Record, field: &str, id: RecordId) -> Result<()> {
        self.association(&record.collection, field)?;
        record.stage(StagedChange::Remove {
            field: field.to_string(),
            id,
        });
        Ok(())
    }

    /// Persist a record's scalar fields and every staged association change.
    ///
    /// On error nothing staged is committed and the staged changes stay on the
    /// record.
    pub async fn save(&self, record: &mut Record) -> Result<()> {
        let store = self.collection(&record.collection)?;
        let _guard = store.begin_save(record.id)?;

        store.schema().validate_create(&record.fields)?;
        let steps = self.validate_staged(record).await?;

        let mut created: Vec<(&CollectionStore, RecordId)> = Vec::new();
        let mut intents: BTreeMap<&str, (&Association, BTreeMap<RecordId, bool>)> =
            BTreeMap::new();

        for step in steps {
            let (assoc, id, link) = match step {
                Step::Link(assoc, id) => (assoc, id, true),
                Step::Unlink(assoc, id) => (assoc, id, false),
                Step::LinkNew(assoc, fields) => {
                    let related = self.collection(&assoc.related)?;
                    match related.create(&fields).await {
                        Ok(new) => {
                            created.push((related, new.id));
                            (assoc, new.id, true)
                        }
                        Err(e) => {
                            self.discard(&created).await;
                            return Err(e);
                        }
                    }
                }
            };
            intents
                .entry(assoc.junction.as_str())
                .or_insert_with(|| (assoc, BTreeMap::new()))
                .1
                .insert(id, link);
        }

        for (assoc, wanted) in intents.values() {
            if let Err(e) = self.commit_joins(record.id, assoc, wanted).await {
                if matches!(e, Error::Timeout { .. }) {
                    tracing::warn!(
                        collection = %record.collection,
                        id = record.id,
                        junction = %assoc.junction,
                        created = created.len(),
                        "join commit timed out, keeping created records"
                    );
                } else {
                    self.discard(&created).await;
                }
                return Err(e);
            }
        }

        let touched: BTreeSet<String> = record
            .staged()
            .iter()
            .map(|c| c.field().to_string())
            .collect();

        let stored = store.persist(record).await?;
        record.fields = stored.fields;
        record.updated_at = stored.updated_at;
        record.clear_staged();

        tracing::debug!(
            collection = %record.collection,
            id = record.id,
            created = created.len(),
            "saved record"
        );

        for field in touched {
            if record.populated.contains_key(&field) {
                let refreshed = self.populate(record.clone(), &field).await?;
                record.populated = refreshed.populated;
            }
        }

        Ok(())
    }

    async fn validate_staged<'a>(&'a self, record: &Record) -> Result<Vec<Step<'a>>> {
        let mut steps = Vec::with_capacity(record.staged().len());

        for change in record.staged() {
            let assoc = self.association(&record.collection, change.field())?;
            let related = self.collection(&assoc.related)?;

            let step = match change {
                StagedChange::Add {
                    related: Related::Id(id),
                    ..
                } => {
                    if related.get(*id).await?.is_none() {
                        return Err(Error::MissingReference {
                            collection: assoc.related.clone(),
                            id: *id,
                        });
                    }
                    Step::Link(assoc, *id)
                }
                StagedChange::Add {
                    related: Related::New(fields),
                    ..
                } => Step::LinkNew(assoc, related.schema().validate_create(fields)?),
                StagedChange::Remove { id, .. } => Step::Unlink(assoc, *id),
            };
            steps.push(step);
        }

        Ok(steps)
    }

    /// Bring the join entries of `owner` in line with `wanted` in one batch.
    async fn commit_joins(
        &self,
        owner: RecordId,
        assoc: &Association,
        wanted: &BTreeMap<RecordId, bool>,
    ) -> Result<()> {
        let junction = self.junction(&assoc.junction)?;

        let existing: BTreeSet<RecordId> = junction
            .find(
                &Criteria::new()
                    .with(assoc.own_column.clone(), owner)
                    .with(assoc.related_column.clone(), wanted.keys().copied().collect::<Vec<_>>()),
            )
            .await?
            .iter()
            .filter_map(|e| e.get(&assoc.related_column).and_then(|v| v.as_i64()))
            .collect();

        let mut batch = Batch::default();
        let mut unlink = Vec::new();
        for (&id, &link) in wanted {
            match (link, existing.contains(&id)) {
                (true, false) => {
                    let mut entry = Fields::new();
                    entry.insert(assoc.own_column.clone(), owner.into());
                    entry.insert(assoc.related_column.clone(), id.into());
                    batch.inserts.push(entry);
                }
                (false, true) => unlink.push(id),
                _ => {}
            }
        }
        if !unlink.is_empty() {
            batch.deletes.push(
                Criteria::new()
                    .with(assoc.own_column.clone(), owner)
                    .with(assoc.related_column.clone(), unlink),
            );
        }

        junction.commit(batch).await
    }

    /// Best-effort removal of records created by a save that then failed.
    async fn discard(&self, created: &[(&CollectionStore, RecordId)]) {
        for (store, id) in created {
            if let Err(e) = store.destroy(&Criteria::by_id(*id)).await {
                tracing::error!(
                    collection = %store.identity(),
                    id,
                    error = %e,
                    "failed to discard record created by a failed save"
                );
            }
        }
    }
}
