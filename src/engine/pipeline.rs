// src/engine/pipeline.rs

//! Bounded job pipeline: a pending-jobs queue drained by a fixed pool of
//! workers, feeding a results queue drained by a single collector that
//! persists successful output.
//!
//! ```text
//! submit ──► [jobs: bounded] ──► worker × N ──► [results: bounded] ──► collector ──► ResultStore
//! ```
//!
//! Both queues are bounded, so a burst of submissions stalls the submitters
//! instead of growing memory. Workers never talk to each other; the only
//! thing linking a job to its result is the job id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{DaemonError, Result};
use crate::exec::{AbortSignal, ActorExecutor, ActorInvocation, ActorResult, Outcome};
use crate::store::{ResultStore, StoredRecord};
use crate::types::JobId;

/// `data_type` under which the collector stores actor output.
pub const OUTPUT_DATA_TYPE: &str = "actor-output";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub workers: usize,
    pub queue_capacity: usize,
    pub results_capacity: usize,
    /// Deadline applied to every actor run by a worker.
    pub actor_timeout: Option<Duration>,
    /// `host` column of persisted records.
    pub host: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 100,
            results_capacity: 100,
            actor_timeout: None,
            host: "localhost".to_string(),
        }
    }
}

/// A queued unit of work.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub invocation: ActorInvocation,
}

/// A finished unit of work, on its way to the collector.
#[derive(Debug)]
pub struct JobResult {
    pub id: JobId,
    pub actor: String,
    pub result: ActorResult,
}

/// Running counters, mostly for introspection and tests.
#[derive(Debug, Default)]
pub struct PipelineStats {
    submitted: AtomicU64,
    executed: AtomicU64,
    persisted: AtomicU64,
    dropped: AtomicU64,
}

impl PipelineStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Jobs the collector is done with, persisted or not.
    pub fn collected(&self) -> u64 {
        self.persisted() + self.dropped()
    }
}

pub struct JobPipeline {
    jobs_tx: Mutex<Option<mpsc::Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<PipelineStats>,
}

impl std::fmt::Debug for JobPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPipeline")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl JobPipeline {
    /// Spawn the workers and the collector. Must be called from within a
    /// Tokio runtime.
    pub fn start(
        executor: Arc<dyn ActorExecutor>,
        store: Arc<dyn ResultStore>,
        options: PipelineOptions,
    ) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>(options.queue_capacity.max(1));
        let (results_tx, results_rx) = mpsc::channel::<JobResult>(options.results_capacity.max(1));

        let jobs_rx = Arc::new(AsyncMutex::new(jobs_rx));
        let stats = Arc::new(PipelineStats::default());
        let mut handles = Vec::with_capacity(options.workers + 1);

        for worker in 0..options.workers.max(1) {
            handles.push(tokio::spawn(run_worker(
                worker,
                Arc::clone(&jobs_rx),
                results_tx.clone(),
                Arc::clone(&executor),
                options.actor_timeout,
                Arc::clone(&stats),
            )));
        }
        // The collector stops once every worker has dropped its sender.
        drop(results_tx);

        handles.push(tokio::spawn(run_collector(
            results_rx,
            store,
            options.host.clone(),
            Arc::clone(&stats),
        )));

        info!(
            workers = options.workers,
            queue_capacity = options.queue_capacity,
            results_capacity = options.results_capacity,
            "job pipeline started"
        );

        Self {
            jobs_tx: Mutex::new(Some(jobs_tx)),
            handles: Mutex::new(handles),
            stats,
        }
    }

    /// Queue `invocation` and return its job id.
    ///
    /// Waits while the pending queue is full. Fails with
    /// [`DaemonError::PipelineClosed`] once [`JobPipeline::shutdown`] was
    /// called.
    pub async fn submit(&self, invocation: ActorInvocation) -> Result<JobId> {
        let tx = self
            .jobs_tx
            .lock()
            .clone()
            .ok_or(DaemonError::PipelineClosed)?;

        let id = JobId::random();
        let actor = invocation.actor().to_string();
        debug!(job = %id, %actor, "queueing job");

        tx.send(Job { id, invocation })
            .await
            .map_err(|_| DaemonError::PipelineClosed)?;

        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        info!(job = %id, %actor, "job queued");
        Ok(id)
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Stop accepting jobs, then wait for queued jobs to run and be
    /// collected.
    pub async fn shutdown(&self) {
        drop(self.jobs_tx.lock().take());

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "pipeline task ended abnormally");
            }
        }
        info!("job pipeline stopped");
    }
}

async fn run_worker(
    worker: usize,
    jobs: Arc<AsyncMutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<JobResult>,
    executor: Arc<dyn ActorExecutor>,
    actor_timeout: Option<Duration>,
    stats: Arc<PipelineStats>,
) {
    debug!(worker, "pipeline worker started");

    loop {
        let next = { jobs.lock().await.recv().await };
        let Some(Job { id, invocation }) = next else {
            break;
        };

        let actor = invocation.actor().to_string();
        info!(worker, job = %id, %actor, "scheduling job");

        let result = executor
            .execute(invocation, AbortSignal::from_timeout(actor_timeout))
            .await;
        stats.executed.fetch_add(1, Ordering::Relaxed);
        info!(worker, job = %id, exit_code = ?result.exit_code(), "finished job");

        if results.send(JobResult { id, actor, result }).await.is_err() {
            warn!(worker, job = %id, "results queue closed; stopping worker");
            break;
        }
    }

    debug!(worker, "pipeline worker finished");
}

async fn run_collector(
    mut results: mpsc::Receiver<JobResult>,
    store: Arc<dyn ResultStore>,
    host: String,
    stats: Arc<PipelineStats>,
) {
    debug!("pipeline collector started");

    while let Some(job) = results.recv().await {
        if collect(job, &store, &host).await {
            stats.persisted.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    debug!("pipeline collector finished");
}

/// Persist one job result. Returns whether anything was stored.
///
/// Actor failures are terminal for the job: they are logged and dropped.
/// Storage failures are logged and swallowed so the pipeline keeps moving.
async fn collect(job: JobResult, store: &Arc<dyn ResultStore>, host: &str) -> bool {
    let JobResult { id, actor, result } = job;
    info!(job = %id, %actor, "collecting job");

    match result.outcome() {
        Outcome::Data(_) => {}
        Outcome::ActorFailure(message) => {
            warn!(
                job = %id,
                %actor,
                exit_code = ?result.exit_code(),
                stderr = result.stderr().unwrap_or_default(),
                %message,
                "job failed; dropping result"
            );
            return false;
        }
        Outcome::SpawnFailure(message) => {
            warn!(job = %id, %actor, %message, "job actor could not be started; dropping result");
            return false;
        }
    }

    let record = StoredRecord {
        uid: id.to_string(),
        name: actor,
        host: host.to_string(),
        data_type: OUTPUT_DATA_TYPE.to_string(),
        data: result.stdout().unwrap_or_default().to_string(),
    };

    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.put(record)).await {
        Ok(Ok(())) => {
            info!(job = %id, "job result persisted");
            true
        }
        Ok(Err(e)) => {
            error!(job = %id, error = %e, "failed to persist job result");
            false
        }
        Err(e) => {
            error!(job = %id, error = %e, "persistence task failed");
            false
        }
    }
}
