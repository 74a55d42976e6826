// src/engine/registry.rs

//! Registry of tasks started for immediate execution.
//!
//! Every task gets its own worker and its own `watch` channel. The channel
//! holds the task's whole state (status + result) as one value, so a reader
//! can never observe `Completed` without the result, and a single
//! `send_if_modified` releases every waiter at once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::errors::{DaemonError, Result};
use crate::exec::{AbortSignal, ActorExecutor, ActorInvocation, ActorResult};
use crate::types::TaskId;

/// How many fresh ids `create` draws before giving up on a collision.
pub const MAX_ID_ATTEMPTS: usize = 8;

/// Source of candidate task ids.
pub type IdSource = Arc<dyn Fn() -> TaskId + Send + Sync>;

/// Status of a task. `Completed` carries the result it completed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed(ActorResult),
}

impl TaskStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed(_))
    }
}

/// Point-in-time view of a task, returned by [`TaskRegistry::get_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub actor: String,
    pub status: TaskStatus,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskSnapshot {
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    pub fn result(&self) -> Option<&ActorResult> {
        match &self.status {
            TaskStatus::Completed(result) => Some(result),
            TaskStatus::Running => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Deadline applied to every actor started by the registry.
    pub actor_timeout: Option<Duration>,
    /// How long an observed, completed task is kept before it may be swept.
    pub retention: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            actor_timeout: None,
            retention: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
struct TaskState {
    status: TaskStatus,
    completed_at: Option<DateTime<Utc>>,
}

struct TaskEntry {
    actor: String,
    submitted_at: DateTime<Utc>,
    state: watch::Sender<TaskState>,
    /// Set once a reader has seen this task in its completed state.
    observed: AtomicBool,
}

impl TaskEntry {
    fn snapshot(&self, id: TaskId) -> TaskSnapshot {
        let state = self.state.borrow().clone();
        TaskSnapshot {
            id,
            actor: self.actor.clone(),
            status: state.status,
            submitted_at: self.submitted_at,
            completed_at: state.completed_at,
        }
    }

    fn evictable(&self, now: DateTime<Utc>, retention: TimeDelta) -> bool {
        if !self.observed.load(Ordering::Acquire) {
            return false;
        }
        self.state
            .borrow()
            .completed_at
            .is_some_and(|done| now - done >= retention)
    }
}

/// Concurrency-safe registry of running and completed tasks.
///
/// Cheap to clone; clones share the same underlying map.
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<DashMap<TaskId, Arc<TaskEntry>>>,
    executor: Arc<dyn ActorExecutor>,
    options: RegistryOptions,
    next_id: IdSource,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.tasks.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TaskRegistry {
    pub fn new(executor: Arc<dyn ActorExecutor>, options: RegistryOptions) -> Self {
        Self::with_id_source(executor, options, Arc::new(TaskId::random))
    }

    /// Like [`TaskRegistry::new`], but drawing candidate ids from `next_id`.
    pub fn with_id_source(
        executor: Arc<dyn ActorExecutor>,
        options: RegistryOptions,
        next_id: IdSource,
    ) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            executor,
            options,
            next_id,
        }
    }

    /// Register a new task and start executing it on its own worker.
    ///
    /// Returns as soon as the task is recorded as `Running`. Must be called
    /// from within a Tokio runtime.
    pub fn create(&self, invocation: ActorInvocation) -> Result<TaskId> {
        let (state, _) = watch::channel(TaskState {
            status: TaskStatus::Running,
            completed_at: None,
        });
        let entry = Arc::new(TaskEntry {
            actor: invocation.actor().to_string(),
            submitted_at: Utc::now(),
            state,
            observed: AtomicBool::new(false),
        });

        let id = self.insert_unique(&entry)?;
        info!(task = %id, actor = invocation.actor(), "task created");

        let executor = Arc::clone(&self.executor);
        let abort = AbortSignal::from_timeout(self.options.actor_timeout);
        tokio::spawn(async move {
            let result = executor.execute(invocation, abort).await;
            complete(id, &entry, result);
        });

        Ok(id)
    }

    /// Current state of task `id`.
    ///
    /// - `wait = false` returns immediately with whatever state the task is
    ///   in.
    /// - `wait = true` blocks until the task is completed.
    ///
    /// Unknown (or already evicted) ids yield [`DaemonError::TaskNotFound`].
    pub async fn get_status(&self, id: &TaskId, wait: bool) -> Result<TaskSnapshot> {
        let entry = self
            .tasks
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(DaemonError::TaskNotFound(*id))?;

        if wait {
            let mut rx = entry.state.subscribe();
            rx.wait_for(|state| state.status.is_completed())
                .await
                .map_err(|_| DaemonError::TaskNotFound(*id))?;
        }

        let snapshot = entry.snapshot(*id);
        if snapshot.is_completed() {
            entry.observed.store(true, Ordering::Release);
        }
        Ok(snapshot)
    }

    /// Evict tasks that completed more than `retention` before `now` and have
    /// been read at least once since completing. Returns how many were
    /// evicted.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let retention = TimeDelta::from_std(self.options.retention).unwrap_or(TimeDelta::MAX);
        let mut evicted = 0;

        self.tasks.retain(|id, entry| {
            if entry.evictable(now, retention) {
                debug!(task = %id, "evicting completed task");
                evicted += 1;
                false
            } else {
                true
            }
        });

        evicted
    }

    /// Run [`TaskRegistry::sweep`] every `interval` until the returned handle
    /// is aborted.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = registry.sweep(Utc::now());
                if evicted > 0 {
                    debug!(evicted, remaining = registry.len(), "swept completed tasks");
                }
            }
        })
    }

    /// Number of tasks currently retained.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn insert_unique(&self, entry: &Arc<TaskEntry>) -> Result<TaskId> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = (self.next_id)();
            match self.tasks.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(entry));
                    return Ok(id);
                }
                Entry::Occupied(_) => {
                    warn!(task = %id, attempt, "task id collision; drawing a new id");
                }
            }
        }
        Err(DaemonError::IdCollision(MAX_ID_ATTEMPTS))
    }
}

/// Publish the result of task `id`. Only the task's own worker calls this.
fn complete(id: TaskId, entry: &TaskEntry, result: ActorResult) {
    let exit_code = result.exit_code();
    let spawn_failed = result.is_spawn_failure();

    let applied = entry.state.send_if_modified(move |state| {
        if state.status.is_completed() {
            return false;
        }
        *state = TaskState {
            status: TaskStatus::Completed(result),
            completed_at: Some(Utc::now()),
        };
        true
    });

    if applied {
        info!(task = %id, ?exit_code, spawn_failed, "task completed");
    } else {
        error!(task = %id, "task completed more than once; keeping the first result");
        debug_assert!(applied, "task {id} completed more than once");
    }
}
