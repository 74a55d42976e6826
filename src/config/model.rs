// src/config/model.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::StoreBackend;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [server]
/// listen = "127.0.0.1:8000"
/// request_timeout_secs = 10
///
/// [actors]
/// dir = "/usr/libexec/actord/actors"
/// timeout_secs = 3600
///
/// [pipeline]
/// workers = 4
/// queue_capacity = 100
///
/// [store]
/// backend = "sqlite"
/// path = "/var/lib/actord/actord.db"
/// ```
///
/// All sections are optional and have reasonable defaults. This is the raw
/// shape; [`DaemonConfig`] is the validated form the rest of the daemon uses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub actors: ActorsSection,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub store: StoreSection,
}

/// `[server]` section: the HTTP boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// How long a synchronous request waits for its actor before answering
    /// "still running".
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log actor stderr for synchronous and polled calls.
    #[serde(default)]
    pub verbose: bool,
}

fn default_listen() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_secs: default_request_timeout_secs(),
            verbose: false,
        }
    }
}

/// `[actors]` section: where actors live and how long they may run.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorsSection {
    #[serde(default = "default_actors_dir")]
    pub dir: PathBuf,

    /// Optional launcher; when set, actor `foo` runs as `<runner> foo`.
    #[serde(default)]
    pub runner: Option<PathBuf>,

    /// Kill actors that run longer than this. Unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_actors_dir() -> PathBuf {
    PathBuf::from("/usr/libexec/actord/actors")
}

impl Default for ActorsSection {
    fn default() -> Self {
        Self {
            dir: default_actors_dir(),
            runner: None,
            timeout_secs: None,
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_capacity")]
    pub results_capacity: usize,

    /// Value of the `host` column for records the pipeline persists.
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_workers() -> usize {
    4
}

fn default_capacity() -> usize {
    100
}

fn default_host() -> String {
    "localhost".to_string()
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_capacity(),
            results_capacity: default_capacity(),
            host: default_host(),
        }
    }
}

/// `[registry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySection {
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    /// `"sqlite"` (default) or `"memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default = "default_store_path")]
    pub path: Option<PathBuf>,
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_store_path() -> Option<PathBuf> {
    Some(PathBuf::from("/var/lib/actord/actord.db"))
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
        }
    }
}

/// Validated configuration.
///
/// Built from a [`RawConfigFile`] via `TryFrom`, see [`super::validate`].
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub actors: ActorsConfig,
    pub pipeline: PipelineConfig,
    pub registry: RegistryConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub request_timeout: Duration,
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct ActorsConfig {
    pub dir: PathBuf,
    pub runner: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub results_capacity: usize,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub retention: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: Option<PathBuf>,
}
