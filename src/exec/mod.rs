// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running actors, using
//! `tokio::process::Command`, and capturing their outcome.
//!
//! - [`actor`] defines invocations, raw results and their classification.
//! - [`abort`] is the caller-supplied cancellation signal.
//! - [`resolver`] maps actor names to programs.
//! - [`actor_runner`] spawns and supervises a single actor process.
//! - [`backend`] provides the `ActorExecutor` trait and the concrete
//!   `ProcessExecutor`, which tests can replace with a fake implementation.

pub mod abort;
pub mod actor;
pub mod actor_runner;
pub mod backend;
pub mod resolver;

pub use abort::AbortSignal;
pub use actor::{ActorInvocation, ActorResult, Outcome};
pub use backend::{ActorExecutor, ProcessExecutor};
pub use resolver::{validate_actor_name, ActorResolver};
