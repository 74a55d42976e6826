use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actord::exec::{AbortSignal, ActorExecutor, ActorInvocation, ActorResult};
use tokio::sync::{Notify, Semaphore};

/// A fake executor that:
/// - records every invocation it was handed
/// - returns a scripted result per actor name (or a default)
/// - optionally holds each execution until the test releases it.
///
/// Cheap to clone; clones share state, so a test can keep one handle while
/// the registry or pipeline owns another.
#[derive(Clone)]
pub struct FakeExecutor {
    inner: Arc<Inner>,
}

struct Inner {
    scripted: Mutex<HashMap<String, ActorResult>>,
    default: ActorResult,
    gate: Option<Semaphore>,
    started: AtomicUsize,
    started_notify: Notify,
    invocations: Mutex<Vec<ActorInvocation>>,
}

impl FakeExecutor {
    /// Every actor succeeds with `{"ok": true}` immediately.
    pub fn new() -> Self {
        Self::build(ok_json(r#"{"ok": true}"#), false)
    }

    /// Like [`FakeExecutor::new`], but every execution waits for a
    /// [`FakeExecutor::release`] permit before returning.
    pub fn gated() -> Self {
        Self::build(ok_json(r#"{"ok": true}"#), true)
    }

    fn build(default: ActorResult, gated: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                scripted: Mutex::new(HashMap::new()),
                default,
                gate: gated.then(|| Semaphore::new(0)),
                started: AtomicUsize::new(0),
                started_notify: Notify::new(),
                invocations: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Return `result` whenever `actor` is executed.
    pub fn script(self, actor: &str, result: ActorResult) -> Self {
        self.inner
            .scripted
            .lock()
            .unwrap()
            .insert(actor.to_string(), result);
        self
    }

    /// Let `n` held executions finish.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.inner.gate {
            gate.add_permits(n);
        }
    }

    /// Number of executions that have started so far.
    pub fn started(&self) -> usize {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` executions have started.
    pub async fn wait_for_started(&self, n: usize) {
        loop {
            let notified = self.inner.started_notify.notified();
            if self.started() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Every invocation seen so far, in start order.
    pub fn invocations(&self) -> Vec<ActorInvocation> {
        self.inner.invocations.lock().unwrap().clone()
    }
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorExecutor for FakeExecutor {
    fn execute(
        &self,
        invocation: ActorInvocation,
        abort: AbortSignal,
    ) -> Pin<Box<dyn Future<Output = ActorResult> + Send + '_>> {
        Box::pin(async move {
            let result = self
                .inner
                .scripted
                .lock()
                .unwrap()
                .get(invocation.actor())
                .cloned()
                .unwrap_or_else(|| self.inner.default.clone());

            self.inner.invocations.lock().unwrap().push(invocation);
            self.inner.started.fetch_add(1, Ordering::SeqCst);
            self.inner.started_notify.notify_waiters();

            if let Some(gate) = &self.inner.gate {
                tokio::select! {
                    permit = gate.acquire() => {
                        permit.expect("gate closed").forget();
                    }
                    reason = abort.fired() => {
                        return ActorResult::Aborted {
                            reason,
                            stdout: String::new(),
                            stderr: String::new(),
                        };
                    }
                }
            }

            result
        })
    }
}

/// Exit code 0 with `stdout` and empty stderr.
pub fn ok_json(stdout: &str) -> ActorResult {
    ActorResult::Exited {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

/// Non-zero exit with the given stderr.
pub fn failed(exit_code: i32, stderr: &str) -> ActorResult {
    ActorResult::Exited {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

pub fn spawn_failed(error: &str) -> ActorResult {
    ActorResult::SpawnFailed {
        error: error.to_string(),
    }
}
