// tests/process_executor.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout, ActorDirBuilder};

use std::error::Error;
use std::time::{Duration, Instant};

use actord::exec::{AbortSignal, ActorExecutor, ActorInvocation, ActorResult, Outcome};
use serde_json::json;
use tokio::sync::oneshot;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn payload_is_fed_on_stdin_and_stdout_captured() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new().actor("echo", "cat").build();
    let executor = actors.executor();

    let payload = r#"{"host":{"value":"10.0.0.1"}}"#;
    let result = with_timeout(
        executor.execute(ActorInvocation::new("echo", payload), AbortSignal::never()),
    )
    .await;

    assert_eq!(result.exit_code(), Some(0));
    assert_eq!(result.stdout(), Some(payload));
    assert_eq!(
        result.outcome(),
        Outcome::Data(json!({"host": {"value": "10.0.0.1"}}))
    );
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_keeps_code_and_stderr() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new()
        .actor("fail", "echo 'no route to host' >&2\nexit 3")
        .build();
    let executor = actors.executor();

    let result = with_timeout(
        executor.execute(ActorInvocation::new("fail", "{}"), AbortSignal::never()),
    )
    .await;

    match &result {
        ActorResult::Exited {
            exit_code, stderr, ..
        } => {
            assert_eq!(*exit_code, 3);
            assert!(stderr.contains("no route to host"), "stderr: {stderr}");
        }
        other => panic!("expected Exited, got {other:?}"),
    }
    assert_eq!(
        result.outcome(),
        Outcome::ActorFailure("actor execution failed with 3".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn missing_actor_is_a_spawn_failure() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new().build();
    let executor = actors.executor();

    let result = with_timeout(
        executor.execute(ActorInvocation::new("nope", "{}"), AbortSignal::never()),
    )
    .await;

    assert!(result.is_spawn_failure(), "got {result:?}");
    assert_eq!(result.exit_code(), None);
    assert!(matches!(result.outcome(), Outcome::SpawnFailure(_)));
    Ok(())
}

#[tokio::test]
async fn non_executable_actor_is_a_spawn_failure() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new().non_executable("plain").build();
    let executor = actors.executor();

    let result = with_timeout(
        executor.execute(ActorInvocation::new("plain", "{}"), AbortSignal::never()),
    )
    .await;

    assert!(result.is_spawn_failure(), "got {result:?}");
    Ok(())
}

#[tokio::test]
async fn names_escaping_the_actors_dir_are_rejected() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new().actor("echo", "cat").build();
    let executor = actors.executor();

    for name in ["../echo", "..", ".", "", "a/b", "echo;rm"] {
        let result = executor
            .execute(ActorInvocation::new(name, "{}"), AbortSignal::never())
            .await;
        assert!(result.is_spawn_failure(), "{name:?} -> {result:?}");
    }
    Ok(())
}

#[tokio::test]
async fn empty_and_malformed_stdout_are_actor_failures() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new()
        .actor("silent", "cat >/dev/null")
        .actor("garbled", "echo 'not json {'")
        .build();
    let executor = actors.executor();

    let silent = with_timeout(
        executor.execute(ActorInvocation::new("silent", "{}"), AbortSignal::never()),
    )
    .await;
    assert_eq!(silent.exit_code(), Some(0));
    assert_eq!(
        silent.outcome(),
        Outcome::ActorFailure("actor didn't return any data".to_string())
    );

    let garbled = with_timeout(
        executor.execute(ActorInvocation::new("garbled", "{}"), AbortSignal::never()),
    )
    .await;
    match garbled.outcome() {
        Outcome::ActorFailure(msg) => assert!(msg.starts_with("could not decode actor output")),
        other => panic!("expected ActorFailure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn deadline_kills_a_hanging_actor() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new()
        .actor("hang", "echo started\nexec sleep 30")
        .build();
    let executor = actors.executor();

    let started = Instant::now();
    let result = with_timeout(executor.execute(
        ActorInvocation::new("hang", "{}"),
        AbortSignal::deadline(Duration::from_millis(300)),
    ))
    .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    match &result {
        ActorResult::Aborted { reason, .. } => assert!(reason.contains("timed out")),
        other => panic!("expected Aborted, got {other:?}"),
    }
    match result.outcome() {
        Outcome::ActorFailure(msg) => assert!(msg.starts_with("actor aborted")),
        other => panic!("expected ActorFailure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn abort_on_request_stops_the_actor() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new().actor("hang", "exec sleep 30").build();
    let executor = actors.executor();

    let (tx, rx) = oneshot::channel();
    let run = executor.execute(
        ActorInvocation::new("hang", "{}"),
        AbortSignal::on_request(rx),
    );
    let trigger = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send("shutting down".to_string()).ok();
    };

    let (result, ()) = with_timeout(async { tokio::join!(run, trigger) }).await;

    assert_eq!(
        result,
        ActorResult::Aborted {
            reason: "shutting down".to_string(),
            stdout: String::new(),
            stderr: String::new(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn runner_receives_the_actor_name() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new()
        .actor("runner", r#"printf '{"actor":"%s"}' "$1""#)
        .build();
    let executor = actord::exec::ProcessExecutor::new(
        actord::exec::ActorResolver::new("/nonexistent").with_runner(actors.path().join("runner")),
    );

    let result = with_timeout(executor.execute(
        ActorInvocation::new("port-mapping", "{}"),
        AbortSignal::never(),
    ))
    .await;

    assert_eq!(result.outcome(), Outcome::Data(json!({"actor": "port-mapping"})));
    Ok(())
}

#[tokio::test]
async fn deadline_still_applies_while_a_forked_helper_holds_stdout() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new()
        .actor(
            "forks",
            "sleep 30 &\necho $! > \"$(dirname \"$0\")/helper.pid\"\necho '{}'",
        )
        .build();
    let executor = actors.executor();

    let started = Instant::now();
    let result = with_timeout(executor.execute(
        ActorInvocation::new("forks", "{}"),
        AbortSignal::deadline(Duration::from_millis(300)),
    ))
    .await;

    assert!(
        started.elapsed() < Duration::from_secs(2),
        "took {:?}",
        started.elapsed()
    );
    match &result {
        ActorResult::Aborted { reason, stdout, .. } => {
            assert!(reason.contains("timed out"));
            assert_eq!(stdout.trim(), "{}");
        }
        other => panic!("expected Aborted, got {other:?}"),
    }

    #[cfg(target_os = "linux")]
    {
        let pid = std::fs::read_to_string(actors.path().join("helper.pid"))?;
        assert!(
            helper_is_gone(pid.trim()).await,
            "helper {} survived the abort",
            pid.trim()
        );
    }
    Ok(())
}

#[tokio::test]
async fn late_output_from_a_helper_is_not_reported_after_the_deadline() -> TestResult {
    init_tracing();
    let actors = ActorDirBuilder::new()
        .actor("detaches", "(sleep 30; echo late) &\nexit 0")
        .build();
    let executor = actors.executor();

    let started = Instant::now();
    let result = with_timeout(executor.execute(
        ActorInvocation::new("detaches", "{}"),
        AbortSignal::deadline(Duration::from_millis(300)),
    ))
    .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    match &result {
        ActorResult::Aborted { stdout, .. } => assert!(!stdout.contains("late")),
        other => panic!("expected Aborted, got {other:?}"),
    }
    Ok(())
}

/// A killed process may linger briefly as a zombie until it is reparented
/// and reaped.
#[cfg(target_os = "linux")]
async fn helper_is_gone(pid: &str) -> bool {
    let stat = std::path::PathBuf::from(format!("/proc/{pid}/stat"));
    for _ in 0..40 {
        match std::fs::read_to_string(&stat) {
            Err(_) => return true,
            Ok(s) if s.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z')) => {
                return true;
            }
            Ok(_) => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
    false
}
