// src/store/mod.rs

//! Result storage for finished work.
//!
//! Records are append-only and keyed by `(uid, name, host, data_type)`.
//! Two implementations exist:
//! - [`memory::MemoryStore`], a concurrent map (lost on restart);
//! - [`sqlite::SqliteStore`], a local SQLite file.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::StoreConfig;
use crate::errors::{DaemonError, Result};
use crate::types::StoreBackend;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One persisted result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub uid: String,
    pub name: String,
    pub host: String,
    pub data_type: String,
    pub data: String,
}

impl StoredRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            uid: self.uid.clone(),
            name: self.name.clone(),
            host: self.host.clone(),
            data_type: self.data_type.clone(),
        }
    }
}

/// Primary key of a [`StoredRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub uid: String,
    pub name: String,
    pub host: String,
    pub data_type: String,
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "uid={} name={} host={} data_type={}",
            self.uid, self.name, self.host, self.data_type
        )
    }
}

/// Selection over the key fields. `None` matches anything, so the default
/// filter selects every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
}

impl RecordFilter {
    pub fn by_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &StoredRecord) -> bool {
        fn field_matches(wanted: &Option<String>, actual: &str) -> bool {
            wanted.as_deref().is_none_or(|w| w == actual)
        }

        field_matches(&self.uid, &record.uid)
            && field_matches(&self.name, &record.name)
            && field_matches(&self.host, &record.host)
            && field_matches(&self.data_type, &record.data_type)
    }
}

/// Abstract result store.
///
/// Implementations must be safe to call from many threads at once. Calls may
/// block (disk IO), so async callers should go through `spawn_blocking`.
pub trait ResultStore: Send + Sync + Debug {
    /// Persist a record. Fails with [`DaemonError::DuplicateRecord`] if the
    /// key already exists; the stored value is left untouched in that case.
    fn put(&self, record: StoredRecord) -> Result<()>;

    /// All records matching `filter`, ordered by key.
    fn select(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>>;

    /// First record stored under `uid`, if any.
    fn get(&self, uid: &str) -> Result<Option<StoredRecord>> {
        Ok(self.select(&RecordFilter::by_uid(uid))?.into_iter().next())
    }
}

/// Open the store described by the `[store]` config section.
pub fn open(cfg: &StoreConfig) -> Result<Arc<dyn ResultStore>> {
    match cfg.backend {
        StoreBackend::Memory => {
            info!("using in-memory result store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = cfg.path.as_ref().ok_or_else(|| {
                DaemonError::ConfigError("[store].path is required for the sqlite backend".into())
            })?;
            info!(path = %path.display(), "using sqlite result store");
            Ok(Arc::new(SqliteStore::open(path)?))
        }
    }
}
