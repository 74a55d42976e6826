// src/exec/actor_runner.rs

//! Individual actor process runner.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::abort::AbortSignal;
use super::actor::ActorResult;

/// How long to wait for output readers after the process group has been
/// killed.
const DRAIN_AFTER_KILL: Duration = Duration::from_millis(500);

type Reader = Option<JoinHandle<Vec<u8>>>;

/// Run one actor process to completion.
///
/// - The actor is the leader of its own process group; aborting kills the
///   whole group so helpers it forked do not outlive it.
/// - The payload is written to stdin from a separate task and stdin is then
///   closed, so an actor that writes a lot before reading cannot deadlock us.
/// - stdout and stderr are captured in memory concurrently. The actor has
///   only finished once both reach EOF, and `abort` stays armed until then.
/// - If `abort` fires first, the group is killed, the child reaped, and
///   `ActorResult::Aborted` returned with whatever output was captured.
/// - `kill_on_drop` guarantees the child does not outlive a dropped runner.
pub async fn run_actor(
    actor: &str,
    mut cmd: Command,
    payload: String,
    abort: AbortSignal,
) -> ActorResult {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(actor, error = %e, "failed to spawn actor process");
            return ActorResult::SpawnFailed {
                error: format!("spawning actor '{actor}': {e}"),
            };
        }
    };

    let pgid = child.id();
    info!(actor, pid = pgid, "actor process started");

    let stdin_writer = child.stdin.take().map(|mut stdin| {
        let actor_name = actor.to_string();
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                // Actors are free to ignore their input and exit early.
                debug!(actor = %actor_name, error = %e, "could not write full payload to stdin");
            }
            // Dropping `stdin` closes the pipe.
        })
    });

    let mut stdout_reader = spawn_reader(child.stdout.take());
    let mut stderr_reader = spawn_reader(child.stderr.take());

    let fired = abort.fired();
    tokio::pin!(fired);

    let result = tokio::select! {
        status_res = child.wait() => {
            // Something else in the group may still hold the pipes open.
            tokio::select! {
                (stdout, stderr) = async {
                    (collect(&mut stdout_reader, None).await, collect(&mut stderr_reader, None).await)
                } => exited(actor, status_res, stdout, stderr),

                reason = &mut fired => {
                    info!(actor, %reason, "actor exited but its output pipes are still open; aborting");
                    kill_group(actor, pgid);
                    aborted(reason, &mut stdout_reader, &mut stderr_reader).await
                }
            }
        }

        reason = &mut fired => {
            info!(actor, %reason, "aborting actor process");
            kill_group(actor, pgid);
            if let Err(e) = child.kill().await {
                warn!(actor, error = %e, "failed to kill actor process");
            }
            aborted(reason, &mut stdout_reader, &mut stderr_reader).await
        }
    };

    if let Some(writer) = stdin_writer {
        writer.abort();
    }
    result
}

fn exited(
    actor: &str,
    status_res: std::io::Result<ExitStatus>,
    stdout: String,
    stderr: String,
) -> ActorResult {
    match status_res {
        Ok(status) => {
            let exit_code = status.code().unwrap_or(-1);
            info!(
                actor,
                exit_code,
                success = status.success(),
                "actor process exited"
            );
            ActorResult::Exited { exit_code, stdout, stderr }
        }
        Err(e) => {
            // The child was spawned but we lost track of it; report it
            // as an abnormal exit rather than a spawn failure.
            warn!(actor, error = %e, "failed waiting for actor process");
            ActorResult::Exited {
                exit_code: -1,
                stdout,
                stderr: format!("{stderr}\nwaiting for actor process: {e}"),
            }
        }
    }
}

async fn aborted(reason: String, stdout: &mut Reader, stderr: &mut Reader) -> ActorResult {
    let stdout = collect(stdout, Some(DRAIN_AFTER_KILL)).await;
    let stderr = collect(stderr, Some(DRAIN_AFTER_KILL)).await;
    ActorResult::Aborted { reason, stdout, stderr }
}

#[cfg(unix)]
fn kill_group(actor: &str, pgid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pgid else {
        return;
    };
    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) => debug!(actor, pgid, "killed actor process group"),
        // Everything in the group already exited.
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(actor, pgid, error = %e, "failed to kill actor process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_actor: &str, _pgid: Option<u32>) {}

fn spawn_reader<R>(stream: Option<R>) -> Reader
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream.map(|mut stream| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = stream.read_to_end(&mut buf).await {
                debug!(error = %e, "error reading actor output stream");
            }
            buf
        })
    })
}

/// Waits for a reader task, giving up after `limit`. The handle is consumed
/// once it resolves or is abandoned.
async fn collect(reader: &mut Reader, limit: Option<Duration>) -> String {
    let Some(handle) = reader.as_mut() else {
        return String::new();
    };

    let joined = match limit {
        None => handle.await,
        Some(limit) => match tokio::time::timeout(limit, &mut *handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                *reader = None;
                return String::new();
            }
        },
    };
    *reader = None;

    match joined {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!(error = %e, "actor output reader task failed");
            String::new()
        }
    }
}
