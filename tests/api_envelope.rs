// tests/api_envelope.rs

mod common;
use crate::common::{failed, init_tracing, ok_json, spawn_failed, with_timeout, FakeExecutor};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use actord::api::{self, AppState};
use actord::engine::{Engine, EngineOptions};
use actord::exec::ActorExecutor;
use actord::store::MemoryStore;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

type TestResult = Result<(), Box<dyn Error>>;

struct TestApp {
    router: Router,
    engine: Arc<Engine>,
}

impl TestApp {
    fn new(executor: impl ActorExecutor, request_timeout: Duration) -> Self {
        let engine = Arc::new(Engine::start(
            Arc::new(executor),
            Arc::new(MemoryStore::new()),
            EngineOptions::default(),
        ));
        let router = api::router(Arc::new(AppState {
            engine: Arc::clone(&engine),
            request_timeout,
            verbose: true,
        }));
        Self { router, engine }
    }

    async fn call(&self, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = with_timeout(self.router.clone().oneshot(request))
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|e| panic!("response is not JSON ({e}): {bytes:?}"));
        (status, value)
    }

    async fn post(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        self.call("POST", uri, Some(body)).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call("GET", uri, None).await
    }
}

fn error_code(envelope: &Value) -> Option<u64> {
    envelope["errors"][0]["code"].as_u64()
}

#[tokio::test]
async fn sync_success_returns_actor_data() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::new().script("portscan", ok_json(r#"{"open":[22]}"#));
    let app = TestApp::new(executor.clone(), Duration::from_secs(5));

    let (status, body) = app
        .post(
            "/port-inspect",
            r#"{"target_host":"10.0.0.5","port_range":"1-1024","shallow_scan":true}"#,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": {"open": [22]}, "errors": []}));

    let invocations = executor.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].actor(), "portscan");
    let input: Value = serde_json::from_str(invocations[0].payload())?;
    assert_eq!(
        input,
        json!({
            "host": {"value": "10.0.0.5"},
            "scan_options": {"shallow_scan": true, "port_range": "1-1024", "force_nmap": false}
        })
    );
    Ok(())
}

#[tokio::test]
async fn actor_failure_is_reported_with_200() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::new().script("port-mapping", failed(2, "unreachable"));
    let app = TestApp::new(executor, Duration::from_secs(5));

    let (status, body) = app
        .post("/port-map", r#"{"source_host":"a","target_host":"b"}"#)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "data": null,
            "errors": [{"code": 2, "message": "actor execution failed with 2"}]
        })
    );
    Ok(())
}

#[tokio::test]
async fn spawn_failure_is_a_500() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::new().script("destroy-container", spawn_failed("not found"));
    let app = TestApp::new(executor, Duration::from_secs(5));

    let (status, body) = app
        .post("/destroy-container", r#"{"container_name":"web"}"#)
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&body), Some(6));
    assert!(body["data"].is_null());
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_a_400_and_runs_nothing() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::new();
    let app = TestApp::new(executor.clone(), Duration::from_secs(5));

    for (uri, body) in [
        ("/check-target", "{not json"),
        ("/port-inspect", r#"{"shallow_scan":"yes"}"#),
        ("/migrate-machine", ""),
    ] {
        let (status, envelope) = app.post(uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error_code(&envelope), Some(1), "{uri}");
    }
    assert!(executor.invocations().is_empty());
    Ok(())
}

#[tokio::test]
async fn slow_sync_call_answers_still_running_and_can_be_polled() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::gated().script("remote-target-check-group", ok_json(r#"{"ok":1}"#));
    let app = TestApp::new(executor.clone(), Duration::from_millis(100));

    let (status, body) = app
        .post("/check-target", r#"{"target_host":"h","target_user":"root"}"#)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(error_code(&body), Some(4));
    let id = body["data"]["id"].as_str().expect("id of running task").to_string();

    let (status, body) = app.get(&format!("/tasks/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(error_code(&body), Some(4));

    executor.release(1);
    let task_id = id.parse()?;
    with_timeout(app.engine.registry().get_status(&task_id, true)).await?;

    let (status, body) = app.get(&format!("/tasks/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": {"ok": 1}, "errors": []}));

    let input: Value = serde_json::from_str(executor.invocations()[0].payload())?;
    assert_eq!(
        input,
        json!({"target_host": {"value": "h"}, "target_user_name": {"value": "root"}})
    );
    Ok(())
}

#[tokio::test]
async fn migrate_machine_is_async_and_pollable() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::gated().script("migrate-machine", ok_json(r#"{"migrated":true}"#));
    let app = TestApp::new(executor.clone(), Duration::from_secs(5));

    let (status, body) = app
        .post(
            "/migrate-machine",
            r#"{
                "container_name": "web",
                "source_host": "src",
                "source_user": "alice",
                "target_host": "dst",
                "target_user": "root",
                "excluded_paths": ["/tmp"],
                "tcp_ports_user_mapping": {"ports": [{"source": 80, "target": 8080}]},
                "excluded_tcp_ports": {"ports": [22]}
            }"#,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["errors"].as_array().is_some_and(|e| e.is_empty()));
    let id = body["data"]["id"].as_str().expect("task id").to_string();

    let (_, body) = app.get(&format!("/migrate-machine/results/{id}")).await;
    assert_eq!(error_code(&body), Some(4));

    executor.release(1);
    with_timeout(app.engine.registry().get_status(&id.parse()?, true)).await?;

    let (status, body) = app.get(&format!("/migrate-machine/results/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"migrated": true}));

    let input: Value = serde_json::from_str(executor.invocations()[0].payload())?;
    assert_eq!(input["source_user_name"], json!({"value": "alice"}));
    assert_eq!(input["excluded_paths"], json!({"value": ["/tmp"]}));
    assert_eq!(input["start_container"], json!({"value": false}));
    assert_eq!(
        input["tcp_ports_user_mapping"],
        json!({"ports": [{"source": 80, "target": 8080}]})
    );
    assert_eq!(input["excluded_tcp_ports"], json!({"ports": [22]}));
    Ok(())
}

#[tokio::test]
async fn unknown_and_malformed_ids() -> TestResult {
    init_tracing();
    let app = TestApp::new(FakeExecutor::new(), Duration::from_secs(5));

    let unknown = actord::types::TaskId::random();
    let (status, body) = app.get(&format!("/tasks/{unknown}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), Some(3));

    let (status, body) = app.get("/migrate-machine/results/42").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), Some(1));

    let (status, body) = app.get(&format!("/jobs/results/{unknown}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), Some(3));
    Ok(())
}

#[tokio::test]
async fn pipeline_jobs_end_up_in_the_store() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::new()
        .script("inventory", ok_json(r#"{"packages":3}"#))
        .script("broken", failed(1, ""));
    let app = TestApp::new(executor.clone(), Duration::from_secs(5));

    let (status, body) = app.post("/jobs/inventory", r#"{"host":"a"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let good = body["data"]["id"].as_str().expect("job id").to_string();

    let (_, body) = app.post("/jobs/broken", "{}").await;
    let bad = body["data"]["id"].as_str().expect("job id").to_string();

    // Drain the pipeline; the store stays readable.
    with_timeout(app.engine.shutdown()).await;

    let (status, body) = app.get(&format!("/jobs/results/{good}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"packages": 3}));

    let (status, _) = app.get(&format!("/jobs/results/{bad}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/records?name=inventory").await;
    assert_eq!(status, StatusCode::OK);
    let records = body["data"].as_array().expect("record list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["uid"], json!(good));
    assert_eq!(records[0]["data_type"], json!("actor-output"));

    let (_, body) = app.get("/records?name=broken").await;
    assert_eq!(body["data"], json!([]));

    let invocations = executor.invocations();
    let payload = invocations
        .iter()
        .find(|i| i.actor() == "inventory")
        .map(|i| i.payload().to_string());
    assert_eq!(payload.as_deref(), Some(r#"{"host":"a"}"#));
    Ok(())
}

#[tokio::test]
async fn bad_job_submissions_are_rejected() -> TestResult {
    init_tracing();
    let executor = FakeExecutor::new();
    let app = TestApp::new(executor.clone(), Duration::from_secs(5));

    let (status, body) = app.post("/jobs/inventory", "plain text").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), Some(1));

    let (status, body) = app.post("/jobs/..", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), Some(1));

    assert_eq!(app.engine.pipeline().stats().submitted(), 0);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn real_actors_through_http() -> TestResult {
    use crate::common::ActorDirBuilder;

    init_tracing();
    let actors = ActorDirBuilder::new()
        .actor("migrate-machine", r#"cat >/dev/null; echo '{"x":1}'"#)
        .actor("port-mapping", "cat >/dev/null\nexit 3")
        .build();
    let app = TestApp::new(actors.executor(), Duration::from_secs(5));

    let (_, body) = app.post("/migrate-machine", "{}").await;
    let id = body["data"]["id"].as_str().expect("task id").to_string();
    with_timeout(app.engine.registry().get_status(&id.parse()?, true)).await?;
    let (status, body) = app.get(&format!("/tasks/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": {"x": 1}, "errors": []}));

    let (status, body) = app.post("/port-map", "{}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["errors"][0]["message"],
        json!("actor execution failed with 3")
    );

    // No such actor in the directory.
    let (status, body) = app.post("/port-inspect", "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&body), Some(6));
    Ok(())
}

#[tokio::test]
async fn unencodable_body_falls_back_to_plain_text() -> TestResult {
    init_tracing();
    // JSON object keys must be strings.
    let body: std::collections::BTreeMap<Vec<u8>, u8> = [(vec![1, 2], 3)].into_iter().collect();

    let response = actord::api::envelope::encode(StatusCode::OK, &body);
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers()[axum::http::header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], b"Internal error");
    Ok(())
}
