// src/api/envelope.rs

//! The uniform response envelope:
//!
//! ```json
//! {"data": <json or null>, "errors": [{"code": 2, "message": "..."}]}
//! ```
//!
//! Handlers produce a [`Reply`]; [`render`] turns it into an HTTP response.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::error;

use crate::exec::{ActorResult, Outcome};
use crate::types::TaskId;

/// Numeric error codes carried in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    BadInput = 1,
    ActorExecution = 2,
    TaskNotFound = 3,
    TaskRunning = 4,
    Internal = 5,
    ActorSpawn = 6,
}

impl ErrorCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub data: Option<Value>,
    pub errors: Vec<ApiError>,
}

/// A request that did not yield data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub status: StatusCode,
    pub error: ApiError,
    /// Partial data sent alongside the error, e.g. the id of a task that is
    /// still running.
    pub data: Option<Value>,
}

impl Failure {
    fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ApiError {
                code,
                message: message.into(),
            },
            data: None,
        }
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::BadInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorCode::TaskNotFound, message)
    }

    /// The task exists but has no result yet. Not an HTTP-level error.
    pub fn still_running(id: TaskId) -> Self {
        Self {
            data: Some(serde_json::json!({ "id": id })),
            ..Self::new(
                StatusCode::OK,
                ErrorCode::TaskRunning,
                "task found, but there is no result yet",
            )
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal, message)
    }

    /// The actor ran and failed; reported with 200.
    pub fn actor(message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, ErrorCode::ActorExecution, message)
    }

    pub fn spawn(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::ActorSpawn, message)
    }
}

pub type Reply = Result<Value, Failure>;

/// Map a finished actor's result onto a reply.
pub fn from_actor_result(result: &ActorResult) -> Reply {
    match result.outcome() {
        Outcome::Data(value) => Ok(value),
        Outcome::ActorFailure(message) => Err(Failure::actor(message)),
        Outcome::SpawnFailure(message) => Err(Failure::spawn(message)),
    }
}

/// Render a reply as an enveloped JSON response.
pub fn render(reply: Reply) -> Response {
    let (status, envelope) = match reply {
        Ok(data) => (
            StatusCode::OK,
            Envelope {
                data: Some(data),
                errors: Vec::new(),
            },
        ),
        Err(failure) => (
            failure.status,
            Envelope {
                data: failure.data,
                errors: vec![failure.error],
            },
        ),
    };
    encode(status, &envelope)
}

/// Serialize `body` as JSON, or fall back to [`plain_internal_error`].
pub fn encode<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => {
            error!(error = %e, "could not encode response");
            plain_internal_error()
        }
    }
}

/// The only response that is not enveloped.
pub fn plain_internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Internal error",
    )
        .into_response()
}
