// src/config/mod.rs

//! Configuration loading and validation for actord.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Turn the raw model into a validated `DaemonConfig` (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    ActorsConfig, ActorsSection, DaemonConfig, PipelineConfig, PipelineSection, RawConfigFile,
    RegistryConfig, RegistrySection, ServerConfig, ServerSection, StoreConfig, StoreSection,
};
