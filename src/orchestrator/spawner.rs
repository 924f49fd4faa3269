//! Agent process spawner.
//!
//! Launches an agent CLI from a rendered [`CommandSpec`] with piped stdio
//! and `kill_on_drop(true)`, then wires three per-session tasks: a stdout
//! reader that decodes events, a stderr watcher that logs (and, for
//! inline-I/O families, detects approval prompts), and an exit watcher
//! that owns the child and reports its exit status.

use std::process::Stdio;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::codec::EventCodec;
use crate::agent::policy::{ApprovalChannel, CommandSpec, SpawnPolicy};
use crate::models::session::ProcessHandle;
use crate::orchestrator::manager::SessionManager;
use crate::orchestrator::store::SharedSession;
use crate::{AppError, Result};

/// Exit status details delivered to the exit handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Spawn the agent process and wire its I/O tasks.
///
/// The returned handle carries the pid, the shared stdin writer, and the
/// cancellation token controlling the reader tasks. The caller stores it
/// on the session.
///
/// # Errors
///
/// Returns `AppError::SpawnFailed` when the executable cannot be started
/// (missing binary, permission denied).
pub async fn spawn_agent(
    manager: &Arc<SessionManager>,
    session: &SharedSession,
    policy: &Arc<dyn SpawnPolicy>,
    spec: CommandSpec,
    bypass_approvals: bool,
    parent_cancel: &CancellationToken,
) -> Result<ProcessHandle> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::SpawnFailed(format!("{}: {err}", spec.program)))?;

    let pid = child
        .id()
        .and_then(|pid| i32::try_from(pid).ok())
        .ok_or_else(|| AppError::SpawnFailed("child has no pid".into()))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::SpawnFailed("child stdin not piped".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::SpawnFailed("child stdout not piped".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::SpawnFailed("child stderr not piped".into()))?;

    if let Some(ref line) = spec.initial_stdin {
        stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|err| AppError::SpawnFailed(format!("initial stdin write: {err}")))?;
        stdin
            .flush()
            .await
            .map_err(|err| AppError::SpawnFailed(format!("initial stdin flush: {err}")))?;
    }

    info!(pid, program = %spec.program, "agent process spawned");

    let cancel = parent_cancel.child_token();
    let handle = ProcessHandle {
        pid,
        stdin: Some(Arc::new(Mutex::new(stdin))),
        cancel: cancel.clone(),
    };

    // Stdout reader: decode events until EOF or cancellation.
    {
        let manager = Arc::clone(manager);
        let session = Arc::clone(session);
        let policy = Arc::clone(policy);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            run_stdout_reader(&manager, &session, &policy, stdout, cancel).await;
        });
    }

    // Stderr watcher: log lines; inline-I/O families also get approval
    // prompt detection here.
    {
        let manager = Arc::clone(manager);
        let session = Arc::clone(session);
        let policy = Arc::clone(policy);
        let cancel = cancel.clone();
        let detect_approvals =
            policy.approval_channel() == ApprovalChannel::InlineIo && !bypass_approvals;
        tokio::spawn(async move {
            run_stderr_watcher(&manager, &session, &policy, stderr, cancel, detect_approvals)
                .await;
        });
    }

    // Exit watcher: owns the child, reports its exit.
    {
        let manager = Arc::clone(manager);
        let session = Arc::clone(session);
        tokio::spawn(async move {
            let info = match child.wait().await {
                Ok(status) => exit_info(status),
                Err(err) => {
                    warn!(pid, %err, "failed to wait on agent process");
                    ExitInfo {
                        code: Some(-1),
                        signal: None,
                    }
                }
            };
            manager.handle_exit(&session, info).await;
        });
    }

    Ok(handle)
}

async fn run_stdout_reader(
    manager: &Arc<SessionManager>,
    session: &SharedSession,
    policy: &Arc<dyn SpawnPolicy>,
    stdout: tokio::process::ChildStdout,
    cancel: CancellationToken,
) {
    let mut framed = FramedRead::new(stdout, EventCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("stdout reader cancelled");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!("agent stdout closed");
                        break;
                    }
                    Some(Err(AppError::Decode(msg))) => {
                        warn!(error = %msg, "skipping oversized stdout line");
                    }
                    Some(Err(err)) => {
                        warn!(%err, "stdout read error, stopping reader");
                        break;
                    }
                    Some(Ok(line)) => match policy.decode_line(&line) {
                        Ok(events) => {
                            for event in events {
                                manager.handle_event(session, event).await;
                            }
                        }
                        Err(err) => {
                            warn!(%err, raw_line = %line, "skipping malformed event line");
                        }
                    },
                }
            }
        }
    }
}

async fn run_stderr_watcher(
    manager: &Arc<SessionManager>,
    session: &SharedSession,
    policy: &Arc<dyn SpawnPolicy>,
    stderr: tokio::process::ChildStderr,
    cancel: CancellationToken,
    detect_approvals: bool,
) {
    let mut lines = BufReader::new(stderr).lines();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if detect_approvals && policy.is_approval_prompt(&line) {
                            // Blocks until the operator (or the timeout)
                            // resolves the question. The agent is blocked
                            // on stdin for the same duration, so serial
                            // handling loses nothing.
                            manager.handle_inline_approval(session, &line).await;
                        } else {
                            debug!(stderr_line = %line, "agent stderr");
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(%err, "stderr read error, stopping watcher");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(unix)]
fn exit_info(status: std::process::ExitStatus) -> ExitInfo {
    use std::os::unix::process::ExitStatusExt;
    ExitInfo {
        code: status.code(),
        signal: status.signal(),
    }
}

#[cfg(not(unix))]
fn exit_info(status: std::process::ExitStatus) -> ExitInfo {
    ExitInfo {
        code: status.code(),
        signal: None,
    }
}
