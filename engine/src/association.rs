//! Resolved many-to-many associations and their join collections.
//!
//! Every association pair `a.x <-> b.y` is backed by one join collection that
//! lives on the dominant side's connection. Each join entry holds one id per
//! side, in columns named `{identity}_{attribute}`.

use crate::schema::{Attribute, CollectionSchema, FieldDef, FieldType, Schema};
use crate::{error::Result, CollectionName, Error};
use std::collections::{BTreeMap, HashMap};

/// One side of an association pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Side {
    pub collection: CollectionName,
    pub attribute: String,
}

impl Side {
    /// Join column holding this side's record ids.
    pub fn column(&self) -> String {
        format!("{}_{}", self.collection, self.attribute)
    }

    fn key(&self) -> String {
        self.column()
    }
}

/// A join collection backing one association pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Junction {
    /// Schema registered with the dominant side's adapter
    pub schema: CollectionSchema,
    /// Collection that owns the physical join entries
    pub dominant: CollectionName,
}

impl Junction {
    pub fn name(&self) -> &str {
        &self.schema.identity
    }
}

/// An association as seen from one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Declaring collection
    pub collection: CollectionName,
    /// Attribute name on the declaring collection
    pub field: String,
    /// Related collection
    pub related: CollectionName,
    /// Join collection name
    pub junction: CollectionName,
    /// Join column holding the declaring record's id
    pub own_column: String,
    /// Join column holding the related record's id
    pub related_column: String,
}

/// All associations of a schema, indexed by `(collection, field)`.
#[derive(Debug, Clone, Default)]
pub struct Associations {
    junctions: BTreeMap<CollectionName, Junction>,
    by_field: HashMap<(CollectionName, String), Association>,
}

impl Associations {
    /// Resolve every association pair of a validated schema.
    pub fn resolve(schema: &Schema) -> Result<Self> {
        let mut resolved = Self::default();

        for collection in schema.collections.values() {
            for assoc in collection.associations() {
                let related = schema.get_collection(&assoc.collection).ok_or_else(|| {
                    Error::InvalidSchema(format!("unknown collection '{}'", assoc.collection))
                })?;
                let inverse = related.association(&assoc.via).ok_or_else(|| {
                    Error::InvalidSchema(format!(
                        "{}.{} has no inverse",
                        collection.identity, assoc.name
                    ))
                })?;

                let here = Side {
                    collection: collection.identity.clone(),
                    attribute: assoc.name.clone(),
                };
                let there = Side {
                    collection: related.identity.clone(),
                    attribute: inverse.name.clone(),
                };

                let dominant = match (assoc.dominant, inverse.dominant) {
                    (true, true) => {
                        return Err(Error::InvalidSchema(format!(
                            "{}.{} and {}.{} are both dominant",
                            here.collection, here.attribute, there.collection, there.attribute
                        )))
                    }
                    (true, false) => collection,
                    (false, true) => related,
                    (false, false) if collection.connection == related.connection => {
                        if here.key() <= there.key() {
                            collection
                        } else {
                            related
                        }
                    }
                    (false, false) => {
                        return Err(Error::InvalidSchema(format!(
                            "{}.{} spans connections '{}' and '{}'; one side must be dominant",
                            here.collection,
                            here.attribute,
                            collection.connection,
                            related.connection
                        )))
                    }
                };

                let (first, second) = if here.key() <= there.key() {
                    (&here, &there)
                } else {
                    (&there, &here)
                };
                let name = format!("{}__{}", first.column(), second.column());

                resolved
                    .junctions
                    .entry(name.clone())
                    .or_insert_with(|| Junction {
                        schema: CollectionSchema::new(
                            name.clone(),
                            dominant.connection.clone(),
                            vec![
                                Attribute::Field(FieldDef::required(
                                    first.column(),
                                    FieldType::Integer,
                                )),
                                Attribute::Field(FieldDef::required(
                                    second.column(),
                                    FieldType::Integer,
                                )),
                            ],
                        ),
                        dominant: dominant.identity.clone(),
                    });

                resolved.by_field.insert(
                    (here.collection.clone(), here.attribute.clone()),
                    Association {
                        collection: here.collection.clone(),
                        field: here.attribute.clone(),
                        related: there.collection.clone(),
                        junction: name,
                        own_column: here.column(),
                        related_column: there.column(),
                    },
                );
            }
        }

        Ok(resolved)
    }

    /// Look up the association declared as `field` on `collection`.
    pub fn get(&self, collection: &str, field: &str) -> Result<&Association> {
        self.by_field
            .get(&(collection.to_string(), field.to_string()))
            .ok_or_else(|| Error::UnknownAssociation {
                collection: collection.to_string(),
                field: field.to_string(),
            })
    }

    pub fn junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.values()
    }

    pub fn junction(&self, name: &str) -> Option<&Junction> {
        self.junctions.get(name)
    }
}
