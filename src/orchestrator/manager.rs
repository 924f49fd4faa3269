//! Session manager.
//!
//! Composes the store, ring history, question registry, classifier, and
//! process spawner into the six tool operations, and owns the per-session
//! state machine. State transitions are driven by exactly three sources:
//! operator tool calls, decoded stdout events, and the exit handler. All
//! mutation of one session happens under that session's mutex.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::event::{AgentEvent, StreamEvent, TurnStatus};
use crate::agent::policy::{ApprovalChannel, BridgeRef, SpawnPolicy};
use crate::approval::bridge::PermissionRequest;
use crate::approval::classify;
use crate::approval::registry::{QuestionRegistry, TimeoutFn};
use crate::config::WardenConfig;
use crate::models::question::{PendingQuestion, QuestionKind};
use crate::models::session::{
    is_temp_id, temp_id, Session, SessionStatus, SpawnParams, StatusView, ToolUseRecord,
    ToolUseStatus,
};
use crate::orchestrator::spawner::{self, ExitInfo};
use crate::orchestrator::store::{SessionStore, SharedSession};
use crate::persistence::index;
use crate::{AppError, Result};

/// How long `start` waits for the agent to report its real session id.
const REAL_ID_WAIT: Duration = Duration::from_secs(10);

/// Grace period after SIGINT before escalating to SIGKILL on a mid-session
/// parameter change.
const MODE_CHANGE_GRACE: Duration = Duration::from_secs(5);

/// Poll interval for id and exit waits.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome shared by start/say/respond/interrupt.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OpOutcome {
    pub session_id: String,
    pub status: SessionStatus,
}

/// Optional overrides accepted by `say`.
#[derive(Debug, Clone, Default)]
pub struct SayOverrides {
    /// Changing the approval policy mid-session forces a new process.
    pub permission_mode: Option<crate::models::session::PermissionMode>,
    pub images: Vec<String>,
}

/// One row of the `list` operation's output.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListEntry {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
}

/// The session supervisor core.
pub struct SessionManager {
    config: Arc<WardenConfig>,
    policy: Arc<dyn SpawnPolicy>,
    store: SessionStore,
    registry: QuestionRegistry,
    bridge_endpoint: OnceLock<String>,
    shutdown: CancellationToken,
    /// Back-reference handed to per-session I/O tasks.
    self_ref: Weak<SessionManager>,
}

impl SessionManager {
    /// Build a manager around a config and spawn policy.
    #[must_use]
    pub fn new(config: Arc<WardenConfig>, policy: Arc<dyn SpawnPolicy>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            config,
            policy,
            store: SessionStore::new(),
            registry: QuestionRegistry::new(),
            bridge_endpoint: OnceLock::new(),
            shutdown: CancellationToken::new(),
            self_ref: weak.clone(),
        })
    }

    /// Upgrade the back-reference for task wiring.
    fn strong(&self) -> Result<Arc<Self>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| AppError::SpawnFailed("supervisor is shutting down".into()))
    }

    /// Record the approval bridge endpoint once it is listening.
    pub fn set_bridge_endpoint(&self, endpoint: String) {
        let _ = self.bridge_endpoint.set(endpoint);
    }

    /// The cancellation token fanned out to bridge and I/O tasks.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    // ── Tool operations ─────────────────────────────────────────────────

    /// `start`: create a session under a temp id, spawn the agent, wait
    /// briefly for the real id.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` when the live-session limit is reached,
    /// `SpawnFailed` when the CLI cannot be started.
    pub async fn start(&self, params: SpawnParams) -> Result<OpOutcome> {
        let id = temp_id();
        // Take the live-process slot up front: the capacity check and the
        // reservation are one store operation, and a rejection here
        // leaves no session record behind.
        self.store
            .reserve_slot(&id, self.config.max_sessions)
            .await?;

        let session = self
            .store
            .insert(Session::new(
                id.clone(),
                params,
                self.config.event_buffer_size,
            ))
            .await;

        if let Err(err) = self.spawn_into(&session).await {
            // spawn_into normally frees the slot itself; releasing again
            // is a no-op, and this also covers its early-return paths.
            self.store.release_slot(&id).await;
            return Err(err);
        }
        info!(temp_id = %id, "session started");

        // Typical case: the init event arrives well within the window and
        // the operator gets the real id back. Exceeding it is not fatal;
        // the session stays addressable under the temp id.
        let deadline = Instant::now() + REAL_ID_WAIT;
        loop {
            {
                let s = session.lock().await;
                if !is_temp_id(&s.id) || s.status.is_terminal() {
                    return Ok(OpOutcome {
                        session_id: s.id.clone(),
                        status: s.status,
                    });
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        let s = session.lock().await;
        Ok(OpOutcome {
            session_id: s.id.clone(),
            status: s.status,
        })
    }

    /// `say`: deliver a follow-up message, resuming the session into a
    /// fresh process when needed.
    ///
    /// An unknown id is adopted: a terminal placeholder is created and the
    /// resume directive is handed to the agent CLI, which owns the session
    /// transcript on disk.
    ///
    /// # Errors
    ///
    /// `Busy` when a live process cannot take the message, plus the spawn
    /// and capacity errors of the resume path.
    pub async fn say(
        &self,
        session_id: &str,
        message: &str,
        overrides: SayOverrides,
    ) -> Result<OpOutcome> {
        let session = match self.store.get(session_id).await {
            Some(session) => session,
            None => {
                debug!(session_id, "adopting unknown session id for resume");
                self.store
                    .insert(Session::placeholder(
                        session_id.to_owned(),
                        SpawnParams::default(),
                        self.config.event_buffer_size,
                    ))
                    .await
            }
        };

        let needs_new_process = overrides.permission_mode.is_some();
        let message = crate::agent::policy::prompt_with_images(message, &overrides.images);

        // Live-stdin fast path, or a definitive busy answer.
        let mut live_write: Option<(String, Arc<tokio::sync::Mutex<tokio::process::ChildStdin>>, String)> =
            None;
        {
            let s = session.lock().await;
            if let Some(ref process) = s.process {
                if needs_new_process {
                    // fall through to the mode-change path below
                } else if s.status == SessionStatus::Active && self.policy.supports_live_stdin() {
                    let line = self
                        .policy
                        .followup_line(&s.id, &message)
                        .ok_or_else(|| AppError::Busy("family does not take stdin input".into()))?;
                    let stdin = process
                        .stdin
                        .clone()
                        .ok_or_else(|| AppError::Io("agent stdin unavailable".into()))?;
                    live_write = Some((line, stdin, s.id.clone()));
                } else {
                    return Err(AppError::Busy(
                        "a turn is in progress; interrupt the session or wait".into(),
                    ));
                }
            }
        }
        if let Some((line, stdin, id)) = live_write {
            let mut guard = stdin.lock().await;
            guard.write_all(format!("{line}\n").as_bytes()).await?;
            guard.flush().await?;
            return Ok(OpOutcome {
                session_id: id,
                status: SessionStatus::Active,
            });
        }

        if needs_new_process {
            self.interrupt_and_reap(&session, MODE_CHANGE_GRACE).await;
        }

        // Resume: merge overrides, re-render with the resume directive and
        // the message as the prompt.
        {
            let mut s = session.lock().await;
            if let Some(mode) = overrides.permission_mode {
                s.params.permission_mode = Some(mode);
            }
            s.params.resume_session_id = if is_temp_id(&s.id) {
                None
            } else {
                Some(s.id.clone())
            };
            s.params.prompt = message;
            s.params.images = Vec::new();
        }

        self.spawn_into(&session).await?;

        let s = session.lock().await;
        info!(session_id = %s.id, "session resumed");
        Ok(OpOutcome {
            session_id: s.id.clone(),
            status: s.status,
        })
    }

    /// `status`: a consistent snapshot of one session.
    ///
    /// # Errors
    ///
    /// `UnknownSession` when the id does not resolve.
    pub async fn status(&self, session_id: &str, output_lines: Option<usize>) -> Result<StatusView> {
        let session = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| AppError::UnknownSession(session_id.to_owned()))?;
        let s = session.lock().await;
        let n = output_lines.unwrap_or(50);

        Ok(StatusView {
            session_id: s.id.clone(),
            status: s.status,
            result: s.result.clone(),
            error: s.error.clone(),
            recent_output: s
                .history
                .extract(|e| e.as_text_delta().map(str::to_owned), n),
            pending_question: s.pending_question.as_ref().map(PendingQuestion::view),
            tool_use_events: s.tool_uses.clone(),
            metrics: s.metrics.clone(),
        })
    }

    /// `respond`: resolve the pending question with the operator's answers.
    ///
    /// # Errors
    ///
    /// `UnknownSession`, `NoPendingQuestion`, or `QuestionIdMismatch`.
    pub async fn respond(
        &self,
        session_id: &str,
        question_id: &str,
        answers: &[String],
    ) -> Result<OpOutcome> {
        let session = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| AppError::UnknownSession(session_id.to_owned()))?;
        let mut s = session.lock().await;

        let question = s
            .pending_question
            .as_ref()
            .ok_or_else(|| AppError::NoPendingQuestion(session_id.to_owned()))?;
        if question.id != question_id {
            return Err(AppError::QuestionIdMismatch(format!(
                "expected {}, got {question_id}",
                question.id
            )));
        }

        let kind = question.kind;
        let tool_name = question.tool_name.clone();
        let translated = classify::translate(kind, &question.original_input, answers);

        // The registry decides the race against the timeout path; losing
        // it means the question was already auto-denied.
        if !self.registry.resolve(question_id, translated.clone()).await {
            return Err(AppError::NoPendingQuestion(
                "question was already resolved".into(),
            ));
        }

        if kind == QuestionKind::ToolApproval && classify::is_denial(&translated) {
            s.deny_tool_use(&tool_name);
        }
        s.pending_question = None;
        s.status = SessionStatus::Active;

        info!(session_id, question_id, "question resolved by operator");
        Ok(OpOutcome {
            session_id: s.id.clone(),
            status: s.status,
        })
    }

    /// `interrupt`: SIGINT the live process.
    ///
    /// The status flips to INTERRUPTED immediately; a later `Result` event
    /// from the agent remains authoritative and may override it.
    ///
    /// # Errors
    ///
    /// `UnknownSession` or `NoActiveProcess`.
    pub async fn interrupt(&self, session_id: &str) -> Result<OpOutcome> {
        let session = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| AppError::UnknownSession(session_id.to_owned()))?;

        let (outcome, orphaned_question) = {
            let mut s = session.lock().await;
            let pid = s
                .process
                .as_ref()
                .map(|p| p.pid)
                .ok_or_else(|| AppError::NoActiveProcess(session_id.to_owned()))?;

            send_signal(pid, Signal::SIGINT);
            s.status = SessionStatus::Interrupted;
            info!(session_id, pid, "SIGINT delivered");

            // An interrupted agent will never collect an answer; drop any
            // question it left pending.
            let orphaned = s.pending_question.take().map(|q| q.id);
            (
                OpOutcome {
                    session_id: s.id.clone(),
                    status: s.status,
                },
                orphaned,
            )
        };

        if let Some(id) = orphaned_question {
            self.registry.clear(&id).await;
        }
        Ok(outcome)
    }

    /// `list`: merge the agent's on-disk session index with live sessions.
    ///
    /// # Errors
    ///
    /// Currently infallible beyond `Ok`; unreadable index paths read as
    /// empty.
    pub async fn list(
        &self,
        filter_dir: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<SessionListEntry>> {
        let mut entries: Vec<SessionListEntry> = index::read_index(&self.policy.index_layout())
            .into_iter()
            .map(|e| SessionListEntry {
                session_id: e.session_id,
                project: e.project,
                display: e.display,
                timestamp: e.timestamp,
                is_active: false,
                status: None,
            })
            .collect();

        if let Some(dir) = filter_dir {
            entries.retain(|e| e.project.as_deref() == Some(dir));
        }

        // Live sessions not yet on disk (temp ids excluded).
        for (id, session) in self.store.snapshot().await {
            if is_temp_id(&id) || entries.iter().any(|e| e.session_id == id) {
                continue;
            }
            let s = session.lock().await;
            let project = s.working_directory.display().to_string();
            if filter_dir.is_some_and(|dir| dir != project) {
                continue;
            }
            entries.push(SessionListEntry {
                session_id: id,
                project: Some(project),
                display: first_line(&s.params.prompt),
                timestamp: s.created_at,
                is_active: false,
                status: None,
            });
        }

        for entry in &mut entries {
            if let Some(session) = self.store.get(&entry.session_id).await {
                entry.is_active = true;
                entry.status = Some(session.lock().await.status);
            }
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit.unwrap_or(50));
        Ok(entries)
    }

    // ── Event and exit handling ─────────────────────────────────────────

    /// Ingest one decoded event from a session's stdout stream.
    pub async fn handle_event(&self, session: &SharedSession, event: AgentEvent) {
        let mut orphaned_question: Option<String> = None;

        {
            let mut s = session.lock().await;
            s.history.append(event.clone());

            match event {
                AgentEvent::Init { session_id, .. } => {
                    if is_temp_id(&s.id) && !session_id.is_empty() && s.id != session_id {
                        let old = std::mem::replace(&mut s.id, session_id.clone());
                        // Rekey while the session lock is held so the temp
                        // id is unreachable the moment the id changes.
                        if let Err(err) = self.store.rekey(&old, &session_id).await {
                            warn!(%err, "store rekey failed");
                        } else {
                            debug!(old = %old, new = %session_id, "session rekeyed");
                        }
                    }
                }
                AgentEvent::Stream { inner } => match inner {
                    StreamEvent::ToolUseStart { name } => {
                        s.tool_uses.push(ToolUseRecord {
                            name,
                            status: ToolUseStatus::Running,
                        });
                    }
                    StreamEvent::ToolUseStop => s.complete_last_tool_use(),
                    StreamEvent::TextDelta { .. } | StreamEvent::Other { .. } => {}
                },
                AgentEvent::TurnResult {
                    status,
                    text,
                    metrics,
                } => {
                    s.result_seen = true;
                    if let Some(ref m) = metrics {
                        s.metrics.absorb(m);
                    }
                    match status {
                        TurnStatus::Success => {
                            s.status = SessionStatus::Done;
                            // Families whose result carries no text (one
                            // process per turn) fall back to the last
                            // delta.
                            let fallback = if text.is_none() {
                                s.history
                                    .extract(|e| e.as_text_delta().map(str::to_owned), 1)
                                    .pop()
                            } else {
                                None
                            };
                            s.result = text.or(fallback);
                        }
                        TurnStatus::Error => {
                            s.status = SessionStatus::Error;
                            s.error = text;
                        }
                        TurnStatus::Interrupted => s.status = SessionStatus::Interrupted,
                    }
                    // A result arriving over an unanswered question means
                    // the agent gave up on it; drop the resolver.
                    if let Some(q) = s.pending_question.take() {
                        orphaned_question = Some(q.id);
                    }
                }
                AgentEvent::Unknown { .. } => {}
            }
        }

        if let Some(id) = orphaned_question {
            self.registry.clear(&id).await;
        }
    }

    /// Record a process exit.
    ///
    /// A terminal status fixed by a prior `Result` event wins; otherwise
    /// the exit code and signal decide.
    pub async fn handle_exit(&self, session: &SharedSession, info: ExitInfo) {
        let (session_id, orphaned_question) = {
            let mut s = session.lock().await;
            if !s.result_seen {
                if info.signal == Some(Signal::SIGINT as i32) {
                    s.status = SessionStatus::Interrupted;
                } else if info.code == Some(0) {
                    s.status = SessionStatus::Done;
                } else {
                    let code = info.code.unwrap_or(-1);
                    s.status = SessionStatus::Error;
                    s.error = Some(format!("process exited with code {code}"));
                }
            }
            s.process = None;
            debug!(session_id = %s.id, status = ?s.status, "agent process exited");
            // A process that died mid-approval leaves a blocked agent
            // behind; the question cannot be answered any more.
            (s.id.clone(), s.pending_question.take().map(|q| q.id))
        };

        self.store.release_slot(&session_id).await;
        if let Some(id) = orphaned_question {
            self.registry.clear(&id).await;
        }
    }

    // ── Approval handling ───────────────────────────────────────────────

    /// Mediate a callback-bridge approval request end to end.
    ///
    /// Suspends the agent's approval path (the HTTP response) until the
    /// operator responds or the timeout auto-denies; the operator's own
    /// tool calls continue independently.
    ///
    /// # Errors
    ///
    /// `UnknownSession` when no session can be resolved for the label.
    pub async fn mediate_approval(&self, request: PermissionRequest) -> Result<Value> {
        info!(
            request_id = %request.request_id,
            tool = %request.tool_name,
            label = %request.session_id,
            "approval request arrived"
        );
        let session = self
            .store
            .resolve_approval_label(&request.session_id)
            .await
            .ok_or_else(|| AppError::UnknownSession(request.session_id.clone()))?;

        let kind = classify::classify_tool(&request.tool_name);
        let questions = classify::synthesize(kind, &request.tool_name, &request.tool_input);
        let question = PendingQuestion {
            id: request.request_id,
            kind,
            questions,
            original_input: request.tool_input,
            tool_name: request.tool_name,
            asked_at: Utc::now(),
        };

        let rx = match self.register_question(&session, question).await {
            Ok(rx) => rx,
            // At most one pending question per session; a second request
            // is denied outright rather than queued.
            Err(err) => {
                warn!(%err, "denying overlapping approval request");
                return Ok(serde_json::json!({
                    "behavior": "deny",
                    "message": "another approval is already pending for this session",
                }));
            }
        };

        match rx.await {
            Ok(value) => Ok(value),
            Err(_) => Ok(serde_json::json!({
                "behavior": "deny",
                "message": "supervisor shut down before the question was resolved",
            })),
        }
    }

    /// Handle an inline-I/O approval prompt detected on stderr.
    ///
    /// Blocks until resolution, then writes the short token to the agent's
    /// stdin.
    pub async fn handle_inline_approval(&self, session: &SharedSession, prompt: &str) {
        let kind = classify::classify_prompt(prompt);
        let question = PendingQuestion {
            id: Uuid::new_v4().to_string(),
            kind,
            questions: classify::synthesize_inline(kind, prompt),
            original_input: serde_json::json!({ "prompt": prompt }),
            tool_name: String::new(),
            asked_at: Utc::now(),
        };

        let rx = match self.register_question(session, question).await {
            Ok(rx) => rx,
            Err(err) => {
                warn!(%err, "dropping overlapping inline approval prompt");
                return;
            }
        };

        let decision = rx.await.unwrap_or_else(|_| classify::timeout_deny(kind));
        let approved = !classify::is_denial(&decision);
        let token = if approved { "y\n" } else { "n\n" };

        let stdin = {
            let s = session.lock().await;
            s.process
                .as_ref()
                .and_then(|p| p.stdin.as_ref().map(Arc::clone))
        };
        if let Some(stdin) = stdin {
            let mut guard = stdin.lock().await;
            if let Err(err) = guard.write_all(token.as_bytes()).await {
                warn!(%err, "failed to write approval token to agent stdin");
            }
            let _ = guard.flush().await;
        }
    }

    /// Register a question on a session and arm its timeout.
    ///
    /// The timeout path auto-denies, restores the session to ACTIVE, and
    /// forgets the question; the operator observes nothing unless they
    /// polled during the window.
    async fn register_question(
        &self,
        session: &SharedSession,
        question: PendingQuestion,
    ) -> Result<oneshot::Receiver<Value>> {
        let timeout = Duration::from_millis(self.config.approval_timeout_ms);
        let mut s = session.lock().await;
        if s.pending_question.is_some() {
            return Err(AppError::Bridge(
                "a question is already pending for this session".into(),
            ));
        }

        let on_timeout: TimeoutFn = {
            let session = Arc::clone(session);
            let question_id = question.id.clone();
            let kind = question.kind;
            let tool_name = question.tool_name.clone();
            Box::new(move || {
                async move {
                    let mut s = session.lock().await;
                    if s.pending_question
                        .as_ref()
                        .is_some_and(|q| q.id == question_id)
                    {
                        s.pending_question = None;
                        if s.status == SessionStatus::AwaitingInput {
                            s.status = SessionStatus::Active;
                        }
                        if kind == QuestionKind::ToolApproval {
                            s.deny_tool_use(&tool_name);
                        }
                    }
                    classify::timeout_deny(kind)
                }
                .boxed()
            })
        };

        let rx = self.registry.register(&question.id, timeout, on_timeout).await;
        s.status = SessionStatus::AwaitingInput;
        s.pending_question = Some(question);
        Ok(rx)
    }

    // ── Process control ─────────────────────────────────────────────────

    /// Spawn (or re-spawn) the agent process for a session.
    ///
    /// Reserves the session's live-process slot before touching anything;
    /// a capacity rejection leaves the session state exactly as it was.
    async fn spawn_into(&self, session: &SharedSession) -> Result<()> {
        let this = self.strong()?;
        let mut s = session.lock().await;

        self.store
            .reserve_slot(&s.id, self.config.max_sessions)
            .await?;

        let uses_bridge = self.policy.approval_channel() == ApprovalChannel::CallbackBridge
            && !s.params.bypass_approvals;
        let endpoint = self.bridge_endpoint.get().map(String::as_str);
        let label = s.id.clone();
        let bridge = match (uses_bridge, endpoint) {
            (true, Some(endpoint)) => Some(BridgeRef {
                endpoint,
                session_label: &label,
            }),
            _ => None,
        };

        let spec = self.policy.render(&self.config.cli_path, &s.params, bridge);
        let bypass = s.params.bypass_approvals;

        match spawner::spawn_agent(&this, session, &self.policy, spec, bypass, &self.shutdown).await
        {
            Ok(handle) => {
                s.process = Some(handle);
                s.status = SessionStatus::Active;
                s.result_seen = false;
                s.result = None;
                s.error = None;
                Ok(())
            }
            Err(err) => {
                self.store.release_slot(&s.id).await;
                s.process = None;
                s.status = SessionStatus::Error;
                s.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// SIGINT a session's process and wait for the exit handler to reap
    /// it, escalating to SIGKILL after the grace period.
    async fn interrupt_and_reap(&self, session: &SharedSession, grace: Duration) {
        let pid = {
            let s = session.lock().await;
            s.process.as_ref().map(|p| p.pid)
        };
        let Some(pid) = pid else { return };

        send_signal(pid, Signal::SIGINT);
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if session.lock().await.process.is_none() {
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        warn!(pid, "agent did not exit within grace period, sending SIGKILL");
        send_signal(pid, Signal::SIGKILL);
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if session.lock().await.process.is_none() {
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Graceful shutdown: SIGTERM every live process, cancel all pending
    /// question timers, and stop the bridge and I/O tasks.
    pub async fn shutdown(&self) {
        let sessions = self.store.snapshot().await;
        let mut live = 0usize;
        for (_, session) in sessions {
            let pid = {
                let s = session.lock().await;
                s.process.as_ref().map(|p| p.pid)
            };
            if let Some(pid) = pid {
                send_signal(pid, Signal::SIGTERM);
                live += 1;
            }
        }
        self.registry.cleanup().await;
        self.shutdown.cancel();
        info!(live_processes = live, "supervisor shutdown initiated");
    }
}

/// Deliver a signal to a pid, logging delivery failures.
fn send_signal(pid: i32, signal: Signal) {
    if let Err(err) = kill(Pid::from_raw(pid), signal) {
        warn!(pid, ?signal, %err, "failed to deliver signal");
    }
}

/// First non-empty line of a prompt, for list display.
fn first_line(prompt: &str) -> Option<String> {
    let line = prompt.lines().find(|l| !l.trim().is_empty())?;
    Some(line.trim().to_owned())
}
