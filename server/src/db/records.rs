//! Mapping between collection records and table rows.

use kennel_engine::{CollectionSchema, FieldType, Fields, Record};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};

/// Quote an identifier for use in generated SQL.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Column type used to store a field.
pub fn sql_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "TEXT",
        FieldType::Integer => "BIGINT",
        FieldType::Float => "DOUBLE PRECISION",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Json => "JSONB",
    }
}

/// The `SELECT` / `RETURNING` column list for a collection.
pub fn column_list(schema: &CollectionSchema) -> String {
    let mut columns = vec![
        "id".to_string(),
        "created_at".to_string(),
        "updated_at".to_string(),
    ];
    columns.extend(schema.fields().map(|f| quote_ident(&f.name)));
    columns.join(", ")
}

/// Bind a JSON value as the column type of its field. JSON `null` and values
/// of the wrong shape bind as SQL `NULL`.
pub fn push_value(qb: &mut QueryBuilder<'_, Postgres>, field_type: FieldType, value: &Value) {
    match field_type {
        FieldType::String => qb.push_bind(value.as_str().map(str::to_owned)),
        FieldType::Integer => qb.push_bind(value.as_i64()),
        FieldType::Float => qb.push_bind(value.as_f64()),
        FieldType::Boolean => qb.push_bind(value.as_bool()),
        FieldType::Json => qb.push_bind(Some(value.clone()).filter(|v| !v.is_null())),
    };
}

/// Convert a row selected with [`column_list`] into a record. `NULL` columns
/// are left out of the record's fields.
pub fn row_to_record(row: &PgRow, schema: &CollectionSchema) -> Result<Record, sqlx::Error> {
    let mut fields = Fields::new();

    for field in schema.fields() {
        let name = field.name.as_str();
        let value = match field.field_type {
            FieldType::String => row.try_get::<Option<String>, _>(name)?.map(Value::from),
            FieldType::Integer => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
            FieldType::Float => row.try_get::<Option<f64>, _>(name)?.map(Value::from),
            FieldType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::from),
            FieldType::Json => row.try_get::<Option<Value>, _>(name)?,
        };
        if let Some(value) = value {
            fields.insert(field.name.clone(), value);
        }
    }

    Ok(Record::new(
        row.try_get("id")?,
        schema.identity.clone(),
        fields,
        row.try_get("created_at")?,
        row.try_get("updated_at")?,
    ))
}
