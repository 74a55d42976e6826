// src/api/mod.rs

//! HTTP/JSON request boundary.
//!
//! Translates endpoint-specific request bodies into actor input, hands them
//! to the registry (synchronous and polled calls) or the pipeline (queued
//! jobs), and renders every answer in the same envelope.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;

use crate::engine::Engine;

pub mod envelope;
pub mod handlers;
pub mod params;

pub use envelope::{ApiError, Envelope, ErrorCode, Failure, Reply};
pub use params::{
    ActorRequest, CheckTargetParams, DestroyContainerParams, ExcludedTcpPorts, MigrateParams,
    ObjValue, PortInspectParams, PortMapParams, PortMapping, TcpPortsUserMapping,
};

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Upper bound on how long a synchronous call waits for its actor.
    pub request_timeout: Duration,
    /// Log actor stderr for synchronous and polled calls.
    pub verbose: bool,
}

/// Build the router for every endpoint the daemon exposes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/migrate-machine",
            post(handlers::submit_async::<MigrateParams>),
        )
        .route(
            "/migrate-machine/results/{id}",
            get(handlers::task_result),
        )
        .route("/tasks/{id}", get(handlers::task_result))
        .route("/port-inspect", post(handlers::run_sync::<PortInspectParams>))
        .route("/port-map", post(handlers::run_sync::<PortMapParams>))
        .route("/check-target", post(handlers::run_sync::<CheckTargetParams>))
        .route(
            "/destroy-container",
            post(handlers::run_sync::<DestroyContainerParams>),
        )
        .route("/jobs/{actor}", post(handlers::submit_job))
        .route("/jobs/results/{id}", get(handlers::job_result))
        .route("/records", get(handlers::list_records))
        .with_state(state)
}
