// src/exec/abort.rs

//! Caller-side cancellation for actor processes.
//!
//! The executor never times out on its own. Whoever runs an actor hands it an
//! `AbortSignal`; if the signal resolves before the actor and everything it
//! forked have released their output pipes, the process group is killed and
//! an `Aborted` result is synthesized.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::oneshot;

pub struct AbortSignal {
    fired: Pin<Box<dyn Future<Output = String> + Send>>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self {
            fired: Box::pin(std::future::pending()),
        }
    }

    /// Fires once `timeout` has elapsed.
    pub fn deadline(timeout: Duration) -> Self {
        Self {
            fired: Box::pin(async move {
                tokio::time::sleep(timeout).await;
                format!("timed out after {}s", timeout.as_secs_f64())
            }),
        }
    }

    /// `deadline` when a timeout is configured, `never` otherwise.
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(t) => Self::deadline(t),
            None => Self::never(),
        }
    }

    /// Fires when a value is sent on `rx`.
    ///
    /// Dropping the sender without sending does not fire the signal.
    pub fn on_request(rx: oneshot::Receiver<String>) -> Self {
        Self {
            fired: Box::pin(async move {
                match rx.await {
                    Ok(reason) => reason,
                    Err(_) => std::future::pending().await,
                }
            }),
        }
    }

    /// Resolves with the abort reason once the signal fires.
    pub async fn fired(self) -> String {
        self.fired.await
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal").finish_non_exhaustive()
    }
}
