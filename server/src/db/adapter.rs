//! Adapter storing collections as PostgreSQL tables.
//!
//! Each collection maps to one table named after its identity, with an
//! `id BIGSERIAL` primary key, the two timestamp columns and one column per
//! scalar field.

use super::records::{column_list, push_value, quote_ident, row_to_record, sql_type};
use crate::db::Pool;
use async_trait::async_trait;
use dashmap::DashMap;
use kennel_engine::{
    error::Result, Adapter, Batch, CollectionName, CollectionSchema, Criteria, Error, FieldType,
    Fields, MigratePolicy, Record, Timestamp,
};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

/// An adapter backed by a PostgreSQL connection pool.
#[derive(Debug)]
pub struct PostgresAdapter {
    name: String,
    pool: Pool,
    tables: DashMap<CollectionName, CollectionSchema>,
}

impl PostgresAdapter {
    pub fn new(name: impl Into<String>, pool: Pool) -> Self {
        Self {
            name: name.into(),
            pool,
            tables: DashMap::new(),
        }
    }

    fn schema(&self, collection: &str) -> Result<CollectionSchema> {
        self.tables
            .get(collection)
            .map(|s| s.clone())
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))
    }

    fn db_error(&self, err: sqlx::Error) -> Error {
        Error::adapter(&self.name, err)
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| self.db_error(e))?;
        Ok(())
    }

    async fn create_table(&self, schema: &CollectionSchema) -> Result<()> {
        let table = quote_ident(&schema.identity);

        let mut columns = vec![
            "id BIGSERIAL PRIMARY KEY".to_string(),
            "created_at TIMESTAMPTZ NOT NULL".to_string(),
            "updated_at TIMESTAMPTZ NOT NULL".to_string(),
        ];
        columns.extend(
            schema
                .fields()
                .map(|f| format!("{} {}", quote_ident(&f.name), sql_type(f.field_type))),
        );
        self.execute(&format!(
            "CREATE TABLE IF NOT EXISTS {table} ({})",
            columns.join(", ")
        ))
        .await?;

        for field in schema.fields() {
            self.execute(&format!(
                "ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {} {}",
                quote_ident(&field.name),
                sql_type(field.field_type)
            ))
            .await?;
        }
        Ok(())
    }
}

/// Append `WHERE ...` for the criteria. An array value becomes an `IN` list;
/// a `null` (alone or inside an array) matches `IS NULL`.
fn push_where(
    qb: &mut QueryBuilder<'_, Postgres>,
    schema: &CollectionSchema,
    criteria: &Criteria,
) -> Result<()> {
    if criteria.is_empty() {
        return Ok(());
    }
    qb.push(" WHERE ");

    for (i, (field, expected)) in criteria.iter().enumerate() {
        if i > 0 {
            qb.push(" AND ");
        }
        let field_type = if field == "id" {
            FieldType::Integer
        } else {
            schema
                .field(field)
                .map(|f| f.field_type)
                .ok_or_else(|| Error::InvalidPayload(format!("unknown field '{field}'")))?
        };
        let column = quote_ident(field);

        let options: Vec<&Value> = match expected {
            Value::Array(values) => values.iter().collect(),
            single => vec![single],
        };
        let (nulls, values): (Vec<&Value>, Vec<&Value>) =
            options.into_iter().partition(|v| v.is_null());

        qb.push("(");
        let mut wrote = false;
        if !values.is_empty() {
            qb.push(&column).push(" IN (");
            let mut list = qb.separated(", ");
            for value in values {
                push_separated_value(&mut list, field_type, value);
            }
            list.push_unseparated(")");
            wrote = true;
        }
        if !nulls.is_empty() {
            if wrote {
                qb.push(" OR ");
            }
            qb.push(&column).push(" IS NULL");
            wrote = true;
        }
        if !wrote {
            qb.push("FALSE");
        }
        qb.push(")");
    }
    Ok(())
}

fn push_separated_value(
    list: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>,
    field_type: FieldType,
    value: &Value,
) {
    match field_type {
        FieldType::String => list.push_bind(value.as_str().map(str::to_owned)),
        FieldType::Integer => list.push_bind(value.as_i64()),
        FieldType::Float => list.push_bind(value.as_f64()),
        FieldType::Boolean => list.push_bind(value.as_bool()),
        FieldType::Json => list.push_bind(Some(value.clone()).filter(|v| !v.is_null())),
    };
}

/// Build the `INSERT` for one record, returning its stored columns.
fn insert_query<'a>(
    schema: &CollectionSchema,
    fields: &Fields,
    at: Timestamp,
) -> QueryBuilder<'a, Postgres> {
    let present: Vec<_> = schema
        .fields()
        .filter_map(|f| fields.get(&f.name).map(|v| (f, v)))
        .collect();

    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO {} (created_at, updated_at",
        quote_ident(&schema.identity)
    ));
    for (field, _) in &present {
        qb.push(", ").push(quote_ident(&field.name));
    }
    qb.push(") VALUES (").push_bind(at).push(", ").push_bind(at);
    for (field, value) in &present {
        qb.push(", ");
        push_value(&mut qb, field.field_type, value);
    }
    qb.push(") RETURNING ").push(column_list(schema));
    qb
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn register(&self, schema: &CollectionSchema, policy: MigratePolicy) -> Result<()> {
        match policy {
            MigratePolicy::Safe => {}
            MigratePolicy::Alter => self.create_table(schema).await?,
            MigratePolicy::Drop => {
                self.execute(&format!(
                    "DROP TABLE IF EXISTS {}",
                    quote_ident(&schema.identity)
                ))
                .await?;
                self.create_table(schema).await?;
            }
        }
        tracing::debug!(adapter = %self.name, table = %schema.identity, ?policy, "registered table");
        self.tables.insert(schema.identity.clone(), schema.clone());
        Ok(())
    }

    async fn find(&self, collection: &str, criteria: &Criteria) -> Result<Vec<Record>> {
        let schema = self.schema(collection)?;

        let mut qb = QueryBuilder::new(format!(
            "SELECT {} FROM {}",
            column_list(&schema),
            quote_ident(collection)
        ));
        push_where(&mut qb, &schema, criteria)?;
        qb.push(" ORDER BY id");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.db_error(e))?;
        rows.iter()
            .map(|row| row_to_record(row, &schema).map_err(|e| self.db_error(e)))
            .collect()
    }

    async fn create(&self, collection: &str, fields: Fields, at: Timestamp) -> Result<Record> {
        let schema = self.schema(collection)?;
        let row = insert_query(&schema, &fields, at)
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.db_error(e))?;
        row_to_record(&row, &schema).map_err(|e| self.db_error(e))
    }

    async fn update(
        &self,
        collection: &str,
        criteria: &Criteria,
        fields: Fields,
        at: Timestamp,
    ) -> Result<Vec<Record>> {
        let schema = self.schema(collection)?;

        let mut qb = QueryBuilder::new(format!(
            "UPDATE {} SET updated_at = ",
            quote_ident(collection)
        ));
        qb.push_bind(at);
        for field in schema.fields() {
            if let Some(value) = fields.get(&field.name) {
                qb.push(", ").push(quote_ident(&field.name)).push(" = ");
                push_value(&mut qb, field.field_type, value);
            }
        }
        push_where(&mut qb, &schema, criteria)?;
        qb.push(" RETURNING ").push(column_list(&schema));

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.db_error(e))?;
        let mut records = rows
            .iter()
            .map(|row| row_to_record(row, &schema).map_err(|e| self.db_error(e)))
            .collect::<Result<Vec<_>>>()?;
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn destroy(&self, collection: &str, criteria: &Criteria) -> Result<u64> {
        let schema = self.schema(collection)?;

        let mut qb = QueryBuilder::new(format!("DELETE FROM {}", quote_ident(collection)));
        push_where(&mut qb, &schema, criteria)?;

        let done = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| self.db_error(e))?;
        Ok(done.rows_affected())
    }

    async fn commit(&self, collection: &str, batch: Batch, at: Timestamp) -> Result<()> {
        let schema = self.schema(collection)?;
        let mut tx = self.pool.begin().await.map_err(|e| self.db_error(e))?;

        for criteria in &batch.deletes {
            let mut qb = QueryBuilder::new(format!("DELETE FROM {}", quote_ident(collection)));
            push_where(&mut qb, &schema, criteria)?;
            qb.build()
                .execute(&mut *tx)
                .await
                .map_err(|e| self.db_error(e))?;
        }
        for fields in &batch.inserts {
            insert_query(&schema, fields, at)
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| self.db_error(e))?;
        }

        tx.commit().await.map_err(|e| self.db_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kennel_engine::FieldDef;

    fn pet_schema() -> CollectionSchema {
        CollectionSchema::new(
            "pet",
            "myLocalPostgres",
            vec![
                FieldDef::optional("name", FieldType::String).into(),
                FieldDef::optional("age", FieldType::Integer).into(),
            ],
        )
    }

    fn where_sql(criteria: Criteria) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        push_where(&mut qb, &pet_schema(), &criteria).unwrap();
        qb.sql().to_string()
    }

    #[test]
    fn empty_criteria_has_no_where() {
        assert_eq!(where_sql(Criteria::new()), "SELECT 1");
    }

    #[test]
    fn single_and_array_conditions() {
        let sql = where_sql(Criteria::new().with("age", 3).with("id", vec![1, 2]));
        assert_eq!(
            sql,
            "SELECT 1 WHERE (\"age\" IN ($1)) AND (\"id\" IN ($2, $3))"
        );
    }

    #[test]
    fn null_matches_is_null() {
        let sql = where_sql(Criteria::new().with("name", Value::Null));
        assert_eq!(sql, "SELECT 1 WHERE (\"name\" IS NULL)");

        let sql = where_sql(Criteria::new().with("name", serde_json::json!(["Rex", null])));
        assert_eq!(
            sql,
            "SELECT 1 WHERE (\"name\" IN ($1) OR \"name\" IS NULL)"
        );
    }

    #[test]
    fn empty_array_matches_nothing() {
        let sql = where_sql(Criteria::new().with("id", Vec::<i64>::new()));
        assert_eq!(sql, "SELECT 1 WHERE (FALSE)");
    }

    #[test]
    fn unknown_criteria_field() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        let result = push_where(&mut qb, &pet_schema(), &Criteria::new().with("color", "red"));
        assert!(matches!(result, Err(Error::InvalidPayload(_))));
    }

    #[test]
    fn insert_binds_present_fields_only() {
        let fields = serde_json::json!({"name": "Rex"})
            .as_object()
            .cloned()
            .unwrap();
        let qb = insert_query(&pet_schema(), &fields, chrono::Utc::now());
        assert_eq!(
            qb.sql(),
            "INSERT INTO \"pet\" (created_at, updated_at, \"name\") VALUES ($1, $2, $3) \
             RETURNING id, created_at, updated_at, \"name\", \"age\""
        );
    }
}
