// src/engine/mod.rs

//! Task orchestration engine.
//!
//! This module ties together the two submission paths over the same
//! executor:
//! - the task registry ([`registry`]): one worker per task, status queries
//!   with optional blocking, suited to latency-sensitive synchronous calls;
//! - the job pipeline ([`pipeline`]): bounded queues and a fixed worker pool,
//!   suited to high-volume asynchronous submission;
//!
//! plus the result store the pipeline persists into. An [`Engine`] is built
//! once at startup and handed to the request boundary by reference.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::DaemonConfig;
use crate::exec::ActorExecutor;
use crate::store::ResultStore;

pub mod pipeline;
pub mod registry;

pub use pipeline::{JobPipeline, PipelineOptions, PipelineStats, OUTPUT_DATA_TYPE};
pub use registry::{RegistryOptions, TaskRegistry, TaskSnapshot, TaskStatus};

/// Everything needed to start an [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub registry: RegistryOptions,
    pub pipeline: PipelineOptions,
    /// How often completed tasks are swept from the registry.
    pub sweep_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            registry: RegistryOptions::default(),
            pipeline: PipelineOptions::default(),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl From<&DaemonConfig> for EngineOptions {
    fn from(cfg: &DaemonConfig) -> Self {
        Self {
            registry: RegistryOptions {
                actor_timeout: cfg.actors.timeout,
                retention: cfg.registry.retention,
            },
            pipeline: PipelineOptions {
                workers: cfg.pipeline.workers,
                queue_capacity: cfg.pipeline.queue_capacity,
                results_capacity: cfg.pipeline.results_capacity,
                actor_timeout: cfg.actors.timeout,
                host: cfg.pipeline.host.clone(),
            },
            sweep_interval: cfg.registry.sweep_interval,
        }
    }
}

/// The orchestration engine: registry + pipeline + result store.
#[derive(Debug)]
pub struct Engine {
    registry: TaskRegistry,
    pipeline: JobPipeline,
    store: Arc<dyn ResultStore>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Build the engine and spawn its background tasks. Must be called from
    /// within a Tokio runtime.
    pub fn start(
        executor: Arc<dyn ActorExecutor>,
        store: Arc<dyn ResultStore>,
        options: EngineOptions,
    ) -> Self {
        let registry = TaskRegistry::new(Arc::clone(&executor), options.registry);
        let pipeline = JobPipeline::start(executor, Arc::clone(&store), options.pipeline);
        let sweeper = registry.spawn_sweeper(options.sweep_interval);

        Self {
            registry,
            pipeline,
            store,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &JobPipeline {
        &self.pipeline
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Stop background work and drain the pipeline.
    ///
    /// Registry tasks still running are left alone; their processes are
    /// killed when the runtime drops them.
    pub async fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
        self.pipeline.shutdown().await;
        info!(retained_tasks = self.registry.len(), "engine stopped");
    }
}
