//! # Kennel Engine
//!
//! An object mapper for collections spread across several storage adapters.
//!
//! Collections are declared with a schema that names the connection (adapter)
//! they live on. Collections can be joined by many-to-many associations even
//! when the two sides live on different adapters.
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! Every stored record has:
//! - A sequential integer id, never reused within a collection
//! - Scalar fields validated against the collection schema
//! - `createdAt` / `updatedAt` timestamps maintained by the store
//!
//! ### Adapters
//!
//! An [`Adapter`] stores the collections registered with it. Two ship with
//! the engine:
//! - [`MemoryAdapter`] - in-process tables, mostly for tests
//! - [`DiskAdapter`] - tables persisted to a single JSON file
//!
//! ### Associations
//!
//! An association pair is backed by a join collection on the dominant side's
//! adapter. Changes are staged on a [`Record`] with [`Orm::add`] and
//! [`Orm::remove`] and written by [`Orm::save`]. A save validates every staged
//! change before anything is written.
//!
//! ## Quick Start
//!
//! ```rust
//! use kennel_engine::{
//!     AssociationDef, CollectionSchema, FieldDef, FieldType, MemoryAdapter, Orm,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let orm = Orm::builder()
//!     .connection("mem", Arc::new(MemoryAdapter::default()))
//!     .collection(CollectionSchema::new(
//!         "user",
//!         "mem",
//!         vec![
//!             FieldDef::optional("first_name", FieldType::String).into(),
//!             AssociationDef::new("pets", "pet", "owners").dominant().into(),
//!         ],
//!     ))
//!     .collection(CollectionSchema::new(
//!         "pet",
//!         "mem",
//!         vec![
//!             FieldDef::required("name", FieldType::String).into(),
//!             AssociationDef::new("owners", "user", "pets").into(),
//!         ],
//!     ))
//!     .build()
//!     .await
//!     .unwrap();
//!
//! let users = orm.collection("user").unwrap();
//! let payload = json!({"first_name": "Jo"}).as_object().cloned().unwrap();
//! let mut jo = users.create(&payload).await.unwrap();
//!
//! let rex = json!({"name": "Rex"}).as_object().cloned().unwrap();
//! orm.add(&mut jo, "pets", rex).unwrap();
//! orm.save(&mut jo).await.unwrap();
//!
//! let jo = orm.query("user").populate("pets").one().await.unwrap();
//! assert_eq!(jo.populated("pets").unwrap().len(), 1);
//! # });
//! ```
//!
//! ## Persistence
//!
//! [`DiskAdapter`] writes a [`DiskSnapshot`] after every mutation. Snapshots
//! carry a format version and are rejected when written by a newer engine.

pub mod adapter;
pub mod association;
pub mod criteria;
pub mod disk;
pub mod error;
pub mod memory;
pub mod orm;
pub mod query;
pub mod record;
pub mod resolver;
pub mod schema;
pub mod snapshot;
pub mod staged;
pub mod store;
pub mod table;

// Re-export main types at crate root
pub use adapter::{Adapter, Batch, MigratePolicy};
pub use association::{Association, Associations, Junction};
pub use criteria::Criteria;
pub use disk::DiskAdapter;
pub use error::{Error, ErrorKind};
pub use memory::MemoryAdapter;
pub use orm::{Orm, OrmBuilder};
pub use query::Query;
pub use record::{Record, StoredRecord};
pub use schema::{AssociationDef, Attribute, CollectionSchema, FieldDef, FieldType, Schema};
pub use snapshot::{DiskSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use staged::{Related, StagedChange};
pub use store::{CollectionStore, SaveGuard, DEFAULT_ADAPTER_TIMEOUT};
pub use table::Table;

/// Type aliases for clarity
pub type RecordId = i64;
pub type CollectionName = String;
pub type Fields = serde_json::Map<String, serde_json::Value>;
pub type Timestamp = chrono::DateTime<chrono::Utc>;
