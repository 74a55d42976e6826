// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Actor-level failures are not errors in this sense: they travel inside
//! [`crate::exec::ActorResult`] so a failing actor can never take the daemon
//! down. `DaemonError` covers the daemon's own failure modes.

use thiserror::Error;

use crate::types::TaskId;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Could not allocate a unique task id after {0} attempts")]
    IdCollision(usize),

    #[error("Job pipeline is shut down")]
    PipelineClosed,

    #[error("Record already stored: {0}")]
    DuplicateRecord(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] rusqlite::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DaemonError>;
