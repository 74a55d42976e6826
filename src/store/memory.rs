// src/store/memory.rs

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::{RecordFilter, RecordKey, ResultStore, StoredRecord};
use crate::errors::{DaemonError, Result};

/// In-memory result store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<RecordKey, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ResultStore for MemoryStore {
    fn put(&self, record: StoredRecord) -> Result<()> {
        let key = record.key();
        match self.records.entry(key) {
            Entry::Occupied(existing) => Err(DaemonError::DuplicateRecord(existing.key().to_string())),
            Entry::Vacant(slot) => {
                debug!(key = %slot.key(), "storing record in memory");
                slot.insert(record.data);
                Ok(())
            }
        }
    }

    fn select(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        let mut out: Vec<StoredRecord> = self
            .records
            .iter()
            .map(|entry| {
                let key = entry.key();
                StoredRecord {
                    uid: key.uid.clone(),
                    name: key.name.clone(),
                    host: key.host.clone(),
                    data_type: key.data_type.clone(),
                    data: entry.value().clone(),
                }
            })
            .filter(|record| filter.matches(record))
            .collect();

        out.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(out)
    }
}
