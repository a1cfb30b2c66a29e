//! On-disk format of the disk adapter.
//!
//! The whole store is one JSON document. BTreeMaps keep the serialized order
//! deterministic so unchanged data produces byte-identical files.

use crate::table::Table;
use crate::{error::Result, CollectionName, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Every collection of a disk adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Tables by collection name
    pub collections: BTreeMap<CollectionName, Table>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotView<'a> {
    format_version: u32,
    collections: BTreeMap<&'a str, &'a Table>,
}

impl DiskSnapshot {
    pub fn new(collections: BTreeMap<CollectionName, Table>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collections,
        }
    }

    /// Count records across all collections.
    pub fn record_count(&self) -> usize {
        self.collections.values().map(Table::len).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize borrowed tables in the same format as [`DiskSnapshot::to_json`],
    /// without cloning them into a snapshot first.
    pub fn encode<'a>(
        collections: impl IntoIterator<Item = (&'a str, &'a Table)>,
    ) -> Result<String> {
        let view = SnapshotView {
            format_version: SNAPSHOT_FORMAT_VERSION,
            collections: collections.into_iter().collect(),
        };
        serde_json::to_string(&view).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        for (name, table) in &snapshot.collections {
            if table.name() != name {
                return Err(Error::InvalidSnapshot(format!(
                    "collection '{name}' holds a table named '{}'",
                    table.name()
                )));
            }
        }

        Ok(snapshot)
    }
}
