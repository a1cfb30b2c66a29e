//! Schema definition and validation.
//!
//! Schemas define the attributes of each collection: scalar fields that are
//! validated on create/update, and collection associations that are resolved
//! through a join collection.

use crate::{error::Result, CollectionName, Error, Fields};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute names every record carries and no schema may redeclare.
pub const RESERVED_ATTRIBUTES: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Float => write!(f, "float"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Json => write!(f, "json"),
        }
    }
}

/// Definition of a scalar field in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether this field is required
    pub required: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Validate a JSON value against this field definition.
    pub fn validate(&self, value: Option<&Value>) -> Result<()> {
        match value {
            None if self.required => Err(Error::MissingRequiredField(self.name.clone())),
            None => Ok(()),
            Some(Value::Null) if self.required => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            Some(Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64(),
            FieldType::Float => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A many-to-many association declared on one side of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationDef {
    /// Attribute name on the declaring collection
    pub name: String,
    /// Identity of the related collection
    pub collection: CollectionName,
    /// Name of the inverse association on the related collection
    pub via: String,
    /// Whether this side persists the join entries
    pub dominant: bool,
}

impl AssociationDef {
    pub fn new(
        name: impl Into<String>,
        collection: impl Into<CollectionName>,
        via: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            via: via.into(),
            dominant: false,
        }
    }

    /// Mark this side as the one that stores the join entries.
    pub fn dominant(mut self) -> Self {
        self.dominant = true;
        self
    }
}

/// An attribute of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Attribute {
    Field(FieldDef),
    Collection(AssociationDef),
}

impl Attribute {
    pub fn name(&self) -> &str {
        match self {
            Attribute::Field(f) => &f.name,
            Attribute::Collection(a) => &a.name,
        }
    }
}

impl From<FieldDef> for Attribute {
    fn from(def: FieldDef) -> Self {
        Attribute::Field(def)
    }
}

impl From<AssociationDef> for Attribute {
    fn from(def: AssociationDef) -> Self {
        Attribute::Collection(def)
    }
}

/// Schema for a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Collection identity
    pub identity: CollectionName,
    /// Name of the connection whose adapter stores this collection
    pub connection: String,
    /// Attributes, in declaration order
    pub attributes: Vec<Attribute>,
}

impl CollectionSchema {
    /// Create a new collection schema.
    pub fn new(
        identity: impl Into<CollectionName>,
        connection: impl Into<String>,
        attributes: Vec<Attribute>,
    ) -> Self {
        Self {
            identity: identity.into(),
            connection: connection.into(),
            attributes,
        }
    }

    /// Scalar field definitions.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.attributes.iter().filter_map(|a| match a {
            Attribute::Field(f) => Some(f),
            Attribute::Collection(_) => None,
        })
    }

    /// Association definitions.
    pub fn associations(&self) -> impl Iterator<Item = &AssociationDef> {
        self.attributes.iter().filter_map(|a| match a {
            Attribute::Collection(c) => Some(c),
            Attribute::Field(_) => None,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields().find(|f| f.name == name)
    }

    pub fn association(&self, name: &str) -> Option<&AssociationDef> {
        self.associations().find(|a| a.name == name)
    }

    /// Validate a create payload and return only the declared scalar fields.
    ///
    /// `id`, timestamps, association keys and unknown keys are dropped.
    pub fn validate_create(&self, payload: &Fields) -> Result<Fields> {
        let mut clean = Fields::new();
        for field in self.fields() {
            let value = payload.get(&field.name);
            field.validate(value)?;
            if let Some(v) = value {
                clean.insert(field.name.clone(), v.clone());
            }
        }
        Ok(clean)
    }

    /// Validate a partial update payload and return the declared scalar fields it sets.
    pub fn validate_update(&self, payload: &Fields) -> Result<Fields> {
        let mut clean = Fields::new();
        for (key, value) in payload {
            if let Some(field) = self.field(key) {
                field.validate(Some(value))?;
                clean.insert(key.clone(), value.clone());
            }
        }
        Ok(clean)
    }

    /// Check that every key of a filter names a queryable field.
    pub fn validate_criteria_keys<'a>(&self, keys: impl Iterator<Item = &'a String>) -> Result<()> {
        for key in keys {
            if key != "id" && self.field(key).is_none() {
                return Err(Error::InvalidPayload(format!(
                    "unknown field '{key}' in {} criteria",
                    self.identity
                )));
            }
        }
        Ok(())
    }

    fn validate_definition(&self) -> Result<()> {
        if !is_identifier(&self.identity) {
            return Err(Error::InvalidSchema(format!(
                "collection identity '{}' is not a valid identifier",
                self.identity
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for attr in &self.attributes {
            let name = attr.name();
            if RESERVED_ATTRIBUTES.contains(&name) {
                return Err(Error::InvalidSchema(format!(
                    "{}.{name} redeclares a reserved attribute",
                    self.identity
                )));
            }
            if !is_identifier(name) {
                return Err(Error::InvalidSchema(format!(
                    "{}.{name} is not a valid identifier",
                    self.identity
                )));
            }
            if !seen.insert(name) {
                return Err(Error::InvalidSchema(format!(
                    "{}.{name} is declared twice",
                    self.identity
                )));
            }
        }
        Ok(())
    }
}

/// Names must be safe to splice into table and column names.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Schema for every collection known to the mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Collection schemas by identity
    pub collections: BTreeMap<CollectionName, CollectionSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collection to the schema.
    pub fn add_collection(&mut self, collection: CollectionSchema) -> &mut Self {
        self.collections
            .insert(collection.identity.clone(), collection);
        self
    }

    /// Builder-style method to add a collection.
    pub fn with_collection(mut self, collection: CollectionSchema) -> Self {
        self.add_collection(collection);
        self
    }

    /// Get a collection schema by identity.
    pub fn get_collection(&self, identity: &str) -> Option<&CollectionSchema> {
        self.collections.get(identity)
    }

    /// Check every collection definition and that each association has a
    /// matching inverse on the related collection.
    pub fn validate(&self) -> Result<()> {
        for collection in self.collections.values() {
            collection.validate_definition()?;

            for assoc in collection.associations() {
                let related = self.get_collection(&assoc.collection).ok_or_else(|| {
                    Error::InvalidSchema(format!(
                        "{}.{} refers to unknown collection '{}'",
                        collection.identity, assoc.name, assoc.collection
                    ))
                })?;

                let inverse = related.association(&assoc.via).ok_or_else(|| {
                    Error::InvalidSchema(format!(
                        "{}.{} is via '{}', which is not an association of {}",
                        collection.identity, assoc.name, assoc.via, related.identity
                    ))
                })?;

                if inverse.collection != collection.identity || inverse.via != assoc.name {
                    return Err(Error::InvalidSchema(format!(
                        "{}.{} and {}.{} do not point at each other",
                        collection.identity, assoc.name, related.identity, inverse.name
                    )));
                }

                if related.identity == collection.identity && inverse.name == assoc.name {
                    return Err(Error::InvalidSchema(format!(
                        "{}.{} cannot be its own inverse",
                        collection.identity, assoc.name
                    )));
                }
            }
        }
        Ok(())
    }
}
