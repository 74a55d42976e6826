// src/config/validate.rs

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::config::model::{
    ActorsConfig, DaemonConfig, PipelineConfig, RawConfigFile, RegistryConfig, ServerConfig,
    StoreConfig,
};
use crate::errors::{DaemonError, Result};
use crate::types::StoreBackend;

impl TryFrom<RawConfigFile> for DaemonConfig {
    type Error = DaemonError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        Ok(DaemonConfig {
            server: validate_server(&raw)?,
            actors: validate_actors(&raw)?,
            pipeline: validate_pipeline(&raw)?,
            registry: validate_registry(&raw)?,
            store: validate_store(&raw)?,
        })
    }
}

fn validate_server(cfg: &RawConfigFile) -> Result<ServerConfig> {
    let listen = SocketAddr::from_str(cfg.server.listen.trim()).map_err(|e| {
        DaemonError::ConfigError(format!(
            "[server].listen must be a socket address like 127.0.0.1:8000 (got {:?}): {e}",
            cfg.server.listen
        ))
    })?;

    Ok(ServerConfig {
        listen,
        request_timeout: positive_secs("[server].request_timeout_secs", cfg.server.request_timeout_secs)?,
        verbose: cfg.server.verbose,
    })
}

fn validate_actors(cfg: &RawConfigFile) -> Result<ActorsConfig> {
    if cfg.actors.dir.as_os_str().is_empty() && cfg.actors.runner.is_none() {
        return Err(DaemonError::ConfigError(
            "[actors].dir must not be empty unless [actors].runner is set".to_string(),
        ));
    }

    let timeout = cfg
        .actors
        .timeout_secs
        .map(|secs| positive_secs("[actors].timeout_secs", secs))
        .transpose()?;

    Ok(ActorsConfig {
        dir: cfg.actors.dir.clone(),
        runner: cfg.actors.runner.clone(),
        timeout,
    })
}

fn validate_pipeline(cfg: &RawConfigFile) -> Result<PipelineConfig> {
    let p = &cfg.pipeline;
    for (key, value) in [
        ("workers", p.workers),
        ("queue_capacity", p.queue_capacity),
        ("results_capacity", p.results_capacity),
    ] {
        if value == 0 {
            return Err(DaemonError::ConfigError(format!(
                "[pipeline].{key} must be >= 1 (got 0)"
            )));
        }
    }

    if p.host.trim().is_empty() {
        return Err(DaemonError::ConfigError(
            "[pipeline].host must not be empty".to_string(),
        ));
    }

    Ok(PipelineConfig {
        workers: p.workers,
        queue_capacity: p.queue_capacity,
        results_capacity: p.results_capacity,
        host: p.host.trim().to_string(),
    })
}

fn validate_registry(cfg: &RawConfigFile) -> Result<RegistryConfig> {
    Ok(RegistryConfig {
        // Zero retention is allowed: evict as soon as a completed task was read.
        retention: Duration::from_secs(cfg.registry.retention_secs),
        sweep_interval: positive_secs(
            "[registry].sweep_interval_secs",
            cfg.registry.sweep_interval_secs,
        )?,
    })
}

fn validate_store(cfg: &RawConfigFile) -> Result<StoreConfig> {
    let backend = StoreBackend::from_str(&cfg.store.backend).map_err(DaemonError::ConfigError)?;

    let path = cfg
        .store
        .path
        .clone()
        .filter(|p| !p.as_os_str().is_empty());

    if backend == StoreBackend::Sqlite && path.is_none() {
        return Err(DaemonError::ConfigError(
            "[store].path is required when [store].backend = \"sqlite\"".to_string(),
        ));
    }

    Ok(StoreConfig { backend, path })
}

fn positive_secs(key: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(DaemonError::ConfigError(format!("{key} must be >= 1 (got 0)")));
    }
    Ok(Duration::from_secs(secs))
}
