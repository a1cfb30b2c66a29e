//! Chained finds with optional population.

use crate::{error::Result, CollectionName, Criteria, Orm, Record};
use serde_json::Value;

/// A find on one collection, built up before it runs.
///
/// ```rust,ignore
/// let users = orm.query("user").filter_eq("first_name", "Jo").populate("pets").all().await?;
/// ```
#[derive(Debug)]
pub struct Query<'a> {
    orm: &'a Orm,
    collection: CollectionName,
    criteria: Criteria,
    populate: Vec<String>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(orm: &'a Orm, collection: CollectionName) -> Self {
        Self {
            orm,
            collection,
            criteria: Criteria::new(),
            populate: Vec::new(),
        }
    }

    /// Replace the criteria.
    pub fn filter(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Add one exact-match condition.
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.criteria = self.criteria.with(field, value);
        self
    }

    /// Attach an association to every result.
    pub fn populate(mut self, field: impl Into<String>) -> Self {
        self.populate.push(field.into());
        self
    }

    /// Every matching record, ordered by id.
    pub async fn all(self) -> Result<Vec<Record>> {
        let store = self.orm.collection(&self.collection)?;
        for field in &self.populate {
            self.orm.association(&self.collection, field)?;
        }

        let records = store.find(&self.criteria).await?;
        if self.populate.is_empty() {
            return Ok(records);
        }

        let orm = self.orm;
        let fields = &self.populate;
        futures::future::try_join_all(records.into_iter().map(|record| async move {
            let mut record = record;
            for field in fields {
                record = orm.populate(record, field).await?;
            }
            Ok::<_, crate::Error>(record)
        }))
        .await
    }

    /// The single matching record, or [`crate::Error::RecordNotFound`].
    pub async fn one(self) -> Result<Record> {
        let mut record = self
            .orm
            .collection(&self.collection)?
            .find_one(&self.criteria)
            .await?;
        for field in &self.populate {
            record = self.orm.populate(record, field).await?;
        }
        Ok(record)
    }
}
