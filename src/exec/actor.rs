// src/exec/actor.rs

//! Actor invocation and result types, plus the classification of a raw
//! result into the outcome callers care about.

use serde::Serialize;
use serde_json::Value;

/// One request to run an actor: which actor, and what to feed it on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorInvocation {
    actor: String,
    payload: String,
}

impl ActorInvocation {
    pub fn new(actor: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            payload: payload.into(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// What came back from running an actor.
///
/// `Exited` means the process ran (whatever its exit code), `SpawnFailed`
/// means it never started. `Aborted` is only produced when the caller's
/// [`super::AbortSignal`] fired before the process exited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActorResult {
    Exited {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    SpawnFailed {
        error: String,
    },
    Aborted {
        reason: String,
        stdout: String,
        stderr: String,
    },
}

/// Classified view of an [`ActorResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Exit code 0 and well-formed JSON on stdout.
    Data(Value),
    /// The actor ran but did not produce a usable result.
    ActorFailure(String),
    /// The actor could not be started at all.
    SpawnFailure(String),
}

impl ActorResult {
    /// Exit code of the process, if it exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ActorResult::Exited { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    pub fn stdout(&self) -> Option<&str> {
        match self {
            ActorResult::Exited { stdout, .. } | ActorResult::Aborted { stdout, .. } => {
                Some(stdout)
            }
            ActorResult::SpawnFailed { .. } => None,
        }
    }

    pub fn stderr(&self) -> Option<&str> {
        match self {
            ActorResult::Exited { stderr, .. } | ActorResult::Aborted { stderr, .. } => {
                Some(stderr)
            }
            ActorResult::SpawnFailed { .. } => None,
        }
    }

    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, ActorResult::SpawnFailed { .. })
    }

    /// Classify the raw result.
    ///
    /// Only exit code 0 with non-empty, JSON-decodable stdout counts as
    /// success.
    pub fn outcome(&self) -> Outcome {
        match self {
            ActorResult::SpawnFailed { error } => Outcome::SpawnFailure(error.clone()),
            ActorResult::Aborted { reason, .. } => {
                Outcome::ActorFailure(format!("actor aborted: {reason}"))
            }
            ActorResult::Exited {
                exit_code, stdout, ..
            } => {
                if *exit_code != 0 {
                    return Outcome::ActorFailure(format!(
                        "actor execution failed with {exit_code}"
                    ));
                }
                if stdout.trim().is_empty() {
                    return Outcome::ActorFailure("actor didn't return any data".to_string());
                }
                match serde_json::from_str::<Value>(stdout) {
                    Ok(value) => Outcome::Data(value),
                    Err(e) => {
                        Outcome::ActorFailure(format!("could not decode actor output: {e}"))
                    }
                }
            }
        }
    }
}
