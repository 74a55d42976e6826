use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier handed out for every registry task and pipeline job.
///
/// Backed by a random v4 UUID. The registry still checks for collisions
/// against the ids it currently retains before accepting a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Draw a fresh random id.
    pub fn random() -> Self {
        TaskId(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        TaskId(uuid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(TaskId)
            .map_err(|e| format!("invalid task id {s:?}: {e}"))
    }
}

/// Pipeline jobs share the task id space.
pub type JobId = TaskId;

/// Which [`crate::store::ResultStore`] implementation backs the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Plain concurrent map; results are lost on restart.
    Memory,
    /// SQLite file on local disk.
    Sqlite,
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Sqlite
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(format!(
                "invalid store backend: {other} (expected \"memory\" or \"sqlite\")"
            )),
        }
    }
}
