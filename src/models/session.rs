//! Session model, spawn parameters, and per-session runtime state.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::ChildStdin;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::event::TurnMetrics;
use crate::models::question::PendingQuestion;
use crate::orchestrator::history::RingHistory;

/// Prefix for locally generated placeholder ids used before the agent
/// reports its real session id.
const TEMP_ID_PREFIX: &str = "pending-";

/// Generate a fresh temp id.
#[must_use]
pub fn temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4())
}

/// Whether an id is a locally generated placeholder.
#[must_use]
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Lifecycle status for an agent session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session actively running a turn.
    Active,
    /// Blocked on an operator decision.
    AwaitingInput,
    /// Turn completed successfully.
    Done,
    /// Turn or process failed.
    Error,
    /// Interrupted by the operator or a signal.
    Interrupted,
}

impl SessionStatus {
    /// Whether the status is terminal (no live process expected).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Interrupted)
    }
}

/// Approval behavior requested for the agent process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    Plan,
    BypassPermissions,
}

/// The full parameter bundle for spawning an agent process.
///
/// Stored verbatim on the session so a resume re-renders the same argv.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SpawnParams {
    /// Initial prompt, or the follow-up message on resume.
    pub prompt: String,
    /// Directory the agent runs in.
    pub working_directory: Option<PathBuf>,
    /// Model override.
    pub model: Option<String>,
    /// Approval policy / permission mode.
    pub permission_mode: Option<PermissionMode>,
    /// Sandbox class passed through to families that support one.
    pub sandbox: Option<String>,
    /// Tool allow-list.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Tool deny-list.
    #[serde(default)]
    pub disallowed_tools: Vec<String>,
    /// Turn cap.
    pub max_turns: Option<u32>,
    /// Spend cap in USD. Stored for faithful resume; no family currently
    /// renders a flag for it.
    pub max_budget: Option<f64>,
    /// Extra system-prompt text.
    pub system_prompt: Option<String>,
    /// Image paths referenced by the prompt.
    #[serde(default)]
    pub images: Vec<String>,
    /// Skip the agent's own git-repository safety check.
    #[serde(default)]
    pub skip_git_check: bool,
    /// Suppress all approval wiring.
    #[serde(default)]
    pub bypass_approvals: bool,
    /// When set, spawn resumes this agent-side session id.
    pub resume_session_id: Option<String>,
}

/// Handle to a live agent process.
///
/// The `Child` itself is owned by the exit-watcher task; operations that
/// need the process hold only the pid, the shared stdin writer, and the
/// cancellation token that stops the per-session I/O tasks.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pub pid: i32,
    /// Shared stdin writer; `None` only when the pipe has been lost.
    pub stdin: Option<Arc<Mutex<ChildStdin>>>,
    pub cancel: CancellationToken,
}

/// Status of one observed tool use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolUseStatus {
    Running,
    Completed,
    Denied,
}

/// One tool use observed in the event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolUseRecord {
    pub name: String,
    pub status: ToolUseStatus,
}

/// Accumulated per-session metrics from `Result` events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionMetrics {
    pub cost_usd: Option<f64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub num_turns: Option<u32>,
}

impl SessionMetrics {
    /// Fold one turn's metrics into the running totals.
    pub fn absorb(&mut self, turn: &TurnMetrics) {
        if let Some(cost) = turn.cost_usd {
            *self.cost_usd.get_or_insert(0.0) += cost;
        }
        if let Some(tokens) = turn.input_tokens {
            *self.input_tokens.get_or_insert(0) += tokens;
        }
        if let Some(tokens) = turn.output_tokens {
            *self.output_tokens.get_or_insert(0) += tokens;
        }
        if let Some(turns) = turn.num_turns {
            self.num_turns = Some(turns.max(self.num_turns.unwrap_or(0)));
        }
    }
}

/// A single supervised agent session.
///
/// All mutation happens under the session's `tokio::sync::Mutex` (one
/// mutator at a time); see the store for the sharing model.
pub struct Session {
    /// Agent-assigned id, or a temp id before the first init event.
    pub id: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Live process handle; `None` once terminal.
    pub process: Option<ProcessHandle>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Directory the agent runs in.
    pub working_directory: PathBuf,
    /// Parameter bundle, kept verbatim for resume.
    pub params: SpawnParams,
    /// Bounded event history.
    pub history: RingHistory,
    /// At most one outstanding operator question.
    pub pending_question: Option<PendingQuestion>,
    /// Final turn text once `Done`.
    pub result: Option<String>,
    /// Error description once `Error`.
    pub error: Option<String>,
    /// Accumulated metrics.
    pub metrics: SessionMetrics,
    /// Ordered tool uses observed this session.
    pub tool_uses: Vec<ToolUseRecord>,
    /// A `Result` event fixed the terminal status; the exit handler must
    /// not override it.
    pub result_seen: bool,
}

impl Session {
    /// Construct a fresh session under a temp id.
    #[must_use]
    pub fn new(id: String, params: SpawnParams, history_capacity: usize) -> Self {
        let working_directory = params
            .working_directory
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        Self {
            id,
            status: SessionStatus::Active,
            process: None,
            created_at: Utc::now(),
            working_directory,
            params,
            history: RingHistory::new(history_capacity),
            pending_question: None,
            result: None,
            error: None,
            metrics: SessionMetrics::default(),
            tool_uses: Vec::new(),
            result_seen: false,
        }
    }

    /// Construct a terminal placeholder for an id adopted via `say`.
    #[must_use]
    pub fn placeholder(id: String, params: SpawnParams, history_capacity: usize) -> Self {
        let mut session = Self::new(id, params, history_capacity);
        session.status = SessionStatus::Done;
        session
    }

    /// Mark the most recent still-running tool use as completed.
    pub fn complete_last_tool_use(&mut self) {
        if let Some(record) = self
            .tool_uses
            .iter_mut()
            .rev()
            .find(|r| r.status == ToolUseStatus::Running)
        {
            record.status = ToolUseStatus::Completed;
        }
    }

    /// Mark any still-running tool use with the given name as denied.
    pub fn deny_tool_use(&mut self, name: &str) {
        for record in self
            .tool_uses
            .iter_mut()
            .rev()
            .filter(|r| r.status == ToolUseStatus::Running && r.name == name)
        {
            record.status = ToolUseStatus::Denied;
        }
    }
}

/// Snapshot returned by the `status` operation.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub session_id: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recent_output: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_question: Option<crate::models::question::PendingQuestionView>,
    pub tool_use_events: Vec<ToolUseRecord>,
    pub metrics: SessionMetrics,
}
