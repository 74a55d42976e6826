// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The registry and the job pipeline talk to an `ActorExecutor` instead of
//! spawning processes directly. Production code uses [`ProcessExecutor`];
//! tests provide their own implementation that returns scripted results
//! without touching the OS.

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use super::abort::AbortSignal;
use super::actor::{ActorInvocation, ActorResult};
use super::actor_runner::run_actor;
use super::resolver::ActorResolver;

/// Trait abstracting how a single actor invocation is executed.
///
/// The returned future resolves once the actor is done (or was aborted); it
/// never fails, every failure mode is captured in the [`ActorResult`].
pub trait ActorExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        invocation: ActorInvocation,
        abort: AbortSignal,
    ) -> Pin<Box<dyn Future<Output = ActorResult> + Send + '_>>;
}

/// Real executor used in production: one OS process per invocation.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    resolver: ActorResolver,
}

impl ProcessExecutor {
    pub fn new(resolver: ActorResolver) -> Self {
        Self { resolver }
    }
}

impl ActorExecutor for ProcessExecutor {
    fn execute(
        &self,
        invocation: ActorInvocation,
        abort: AbortSignal,
    ) -> Pin<Box<dyn Future<Output = ActorResult> + Send + '_>> {
        Box::pin(async move {
            let cmd = match self.resolver.command_for(invocation.actor()) {
                Ok(cmd) => cmd,
                Err(error) => {
                    debug!(actor = invocation.actor(), %error, "rejecting actor name");
                    return ActorResult::SpawnFailed { error };
                }
            };

            run_actor(
                invocation.actor(),
                cmd,
                invocation.payload().to_string(),
                abort,
            )
            .await
        })
    }
}
