//! Per-family spawn policy.
//!
//! Everything agent-specific lives behind [`SpawnPolicy`]: argv rendering,
//! event-line decoding, the approval side-channel mode, live-stdin
//! capability, and the on-disk session index layout. Adding another agent
//! family means implementing this trait; the store, registry, and session
//! manager stay untouched.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::event::AgentEvent;
use crate::models::session::SpawnParams;

/// Supported agent families.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentFamily {
    Claude,
    Codex,
}

/// How approval requests reach the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalChannel {
    /// The agent invokes an auxiliary program that POSTs to the loopback
    /// bridge and blocks on the HTTP response.
    CallbackBridge,
    /// The agent writes a prompt to stderr and blocks on stdin for a
    /// short `y`/`n` token.
    InlineIo,
}

/// Where the family keeps its on-disk session index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLayout {
    /// Single append-only JSONL file of `{timestamp, project, display,
    /// session_id}` rows.
    JsonlFile(PathBuf),
    /// Date-partitioned tree (`.../YYYY/MM/DD/<name>.jsonl`) whose first
    /// line carries the session id.
    DateTree(PathBuf),
}

/// A fully rendered process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    /// One line written to stdin immediately after spawn (the initial
    /// prompt for families that take input over stdin).
    pub initial_stdin: Option<String>,
}

/// Approval-bridge wiring passed to argv rendering.
#[derive(Debug, Clone, Copy)]
pub struct BridgeRef<'a> {
    /// Loopback base URL, e.g. `http://127.0.0.1:49321`.
    pub endpoint: &'a str,
    /// Session label the auxiliary program stamps on each request.
    pub session_label: &'a str,
}

/// Strategy bundle for one agent family.
pub trait SpawnPolicy: Send + Sync {
    fn family(&self) -> AgentFamily;

    /// Render the argv for `params`.
    ///
    /// Mandatory flags are always included; optional flags only when the
    /// corresponding param is set. `bridge` carries the approval-bridge
    /// wiring, absent when approvals are bypassed or the family uses
    /// inline I/O.
    fn render(&self, cli_path: &str, params: &SpawnParams, bridge: Option<BridgeRef<'_>>)
        -> CommandSpec;

    /// Decode one stdout line into zero or more events.
    ///
    /// An empty line yields an empty vec. A malformed JSON line yields
    /// `Err`; the caller logs it and keeps reading.
    fn decode_line(&self, line: &str) -> crate::Result<Vec<AgentEvent>>;

    fn approval_channel(&self) -> ApprovalChannel;

    /// Whether a live process accepts follow-up messages over stdin.
    fn supports_live_stdin(&self) -> bool;

    /// The stdin line delivering a follow-up message, for families that
    /// support live stdin.
    fn followup_line(&self, session_id: &str, message: &str) -> Option<String>;

    /// Whether a stderr line looks like an inline approval prompt.
    fn is_approval_prompt(&self, line: &str) -> bool;

    fn index_layout(&self) -> IndexLayout;
}

/// Resolve the policy implementation for a family.
#[must_use]
pub fn policy_for(family: AgentFamily) -> Arc<dyn SpawnPolicy> {
    match family {
        AgentFamily::Claude => Arc::new(crate::agent::claude::ClaudePolicy::new()),
        AgentFamily::Codex => Arc::new(crate::agent::codex::CodexPolicy::new()),
    }
}

/// Join a prompt with its referenced image paths.
///
/// Neither family exposes an argv channel for attachments, so image paths
/// ride along as annotated lines in the prompt body.
#[must_use]
pub fn prompt_with_images(prompt: &str, images: &[String]) -> String {
    if images.is_empty() {
        return prompt.to_owned();
    }
    let mut out = String::from(prompt);
    for image in images {
        out.push_str("\n[Image: ");
        out.push_str(image);
        out.push(']');
    }
    out
}
