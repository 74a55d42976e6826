// src/api/handlers.rs

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::envelope::{from_actor_result, render, Failure, Reply};
use super::params::ActorRequest;
use super::AppState;
use crate::engine::TaskSnapshot;
use crate::errors::DaemonError;
use crate::exec::{validate_actor_name, ActorInvocation};
use crate::store::RecordFilter;
use crate::types::TaskId;

/// Start the actor behind `R` and answer with its task id right away.
pub async fn submit_async<R: ActorRequest>(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    render(start_task::<R>(&state, &body).map(|id| json!({ "id": id })))
}

/// Start the actor behind `R` and wait (up to the request timeout) for its
/// result.
pub async fn run_sync<R: ActorRequest>(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    render(run_sync_inner::<R>(&state, &body).await)
}

async fn run_sync_inner<R: ActorRequest>(state: &AppState, body: &[u8]) -> Reply {
    let id = start_task::<R>(state, body)?;
    let registry = state.engine.registry();

    match tokio::time::timeout(state.request_timeout, registry.get_status(&id, true)).await {
        Err(_) => {
            warn!(task = %id, actor = R::ACTOR, "request timed out; task keeps running");
            Err(Failure::still_running(id))
        }
        Ok(Err(e)) => Err(Failure::internal(format!("lost track of task {id}: {e}"))),
        Ok(Ok(snapshot)) => completed_reply(state, &snapshot),
    }
}

/// `GET /migrate-machine/results/{id}` and `GET /tasks/{id}`.
pub async fn task_result(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    render(task_result_inner(&state, &raw_id).await)
}

async fn task_result_inner(state: &AppState, raw_id: &str) -> Reply {
    let id = parse_id(raw_id)?;

    match state.engine.registry().get_status(&id, false).await {
        Err(DaemonError::TaskNotFound(_)) => Err(Failure::not_found("task not found")),
        Err(e) => Err(Failure::internal(e.to_string())),
        Ok(snapshot) if !snapshot.is_completed() => Err(Failure::still_running(id)),
        Ok(snapshot) => completed_reply(state, &snapshot),
    }
}

/// `POST /jobs/{actor}`: queue the raw JSON body for `actor` on the
/// pipeline.
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    Path(actor): Path<String>,
    body: Bytes,
) -> Response {
    render(submit_job_inner(&state, actor, &body).await)
}

async fn submit_job_inner(state: &AppState, actor: String, body: &[u8]) -> Reply {
    validate_actor_name(&actor).map_err(Failure::bad_input)?;
    let payload: Value = decode(body)?;

    let invocation = ActorInvocation::new(actor, payload.to_string());
    let id = state
        .engine
        .pipeline()
        .submit(invocation)
        .await
        .map_err(|e| Failure::internal(e.to_string()))?;

    Ok(json!({ "id": id }))
}

/// `GET /jobs/results/{id}`: stored output of a pipeline job.
///
/// A job that is still queued, still running or whose actor failed has no
/// record and yields 404.
pub async fn job_result(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    render(job_result_inner(&state, &raw_id).await)
}

async fn job_result_inner(state: &AppState, raw_id: &str) -> Reply {
    let id = parse_id(raw_id)?;
    let store = Arc::clone(state.engine.store());
    let uid = id.to_string();

    let record = tokio::task::spawn_blocking(move || store.get(&uid))
        .await
        .map_err(|e| Failure::internal(e.to_string()))?
        .map_err(|e| Failure::internal(e.to_string()))?
        .ok_or_else(|| Failure::not_found("job result not found"))?;

    serde_json::from_str(&record.data)
        .map_err(|e| Failure::internal(format!("stored result for job {id} is not JSON: {e}")))
}

/// `GET /records?uid=&name=&host=&data_type=`: every matching record.
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<RecordFilter>, QueryRejection>,
) -> Response {
    render(list_records_inner(&state, filter).await)
}

async fn list_records_inner(
    state: &AppState,
    filter: Result<Query<RecordFilter>, QueryRejection>,
) -> Reply {
    let Query(filter) = filter.map_err(|e| Failure::bad_input(e.body_text()))?;
    debug!(?filter, "selecting records");

    let store = Arc::clone(state.engine.store());
    let records = tokio::task::spawn_blocking(move || store.select(&filter))
        .await
        .map_err(|e| Failure::internal(e.to_string()))?
        .map_err(|e| Failure::internal(e.to_string()))?;

    serde_json::to_value(records).map_err(|e| Failure::internal(e.to_string()))
}

fn start_task<R: ActorRequest>(state: &AppState, body: &[u8]) -> Result<TaskId, Failure> {
    let params: R = decode(body)?;
    let invocation = ActorInvocation::new(R::ACTOR, params.actor_input().to_string());

    state
        .engine
        .registry()
        .create(invocation)
        .map_err(|e| Failure::internal(e.to_string()))
}

fn completed_reply(state: &AppState, snapshot: &TaskSnapshot) -> Reply {
    let Some(result) = snapshot.result() else {
        return Err(Failure::still_running(snapshot.id));
    };

    if state.verbose {
        if let Some(stderr) = result.stderr().filter(|s| !s.is_empty()) {
            info!(task = %snapshot.id, actor = %snapshot.actor, %stderr, "actor stderr");
        }
    }

    from_actor_result(result)
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Failure> {
    serde_json::from_slice(body)
        .map_err(|e| Failure::bad_input(format!("could not decode data sent by client: {e}")))
}

fn parse_id(raw: &str) -> Result<TaskId, Failure> {
    raw.parse().map_err(Failure::bad_input)
}
