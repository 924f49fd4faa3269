//! Codex-family spawn policy.
//!
//! Codex runs one process per turn (`exec` / `exec resume`) and emits
//! thread/item/turn JSON events on stdout. Approvals use inline I/O: the
//! CLI writes a prompt to stderr and blocks on stdin for a short token.
//! Whether the production CLI really routes approval prompts through
//! stderr is unconfirmed; the detection pattern here is deliberately loose
//! and isolated behind this policy.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::agent::event::{AgentEvent, StreamEvent, TurnMetrics, TurnStatus};
use crate::agent::policy::{
    prompt_with_images, AgentFamily, ApprovalChannel, BridgeRef, CommandSpec, IndexLayout,
    SpawnPolicy,
};
use crate::models::session::SpawnParams;
use crate::{AppError, Result};

/// Loose inline approval prompt detector: an approval verb followed by a
/// question mark somewhere on the same line.
fn approval_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(allow|approve|apply|permit)\b[^?\n]*\?").expect("valid regex")
    })
}

#[derive(Debug, Deserialize)]
struct ThreadLine {
    #[serde(rename = "type", default)]
    tag: String,
    thread_id: Option<String>,
    item: Option<ThreadItem>,
    usage: Option<ThreadUsage>,
    error: Option<ThreadError>,
}

#[derive(Debug, Deserialize)]
struct ThreadItem {
    item_type: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ThreadError {
    message: Option<String>,
}

/// Spawn policy for the codex CLI.
pub struct CodexPolicy;

impl CodexPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for CodexPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SpawnPolicy for CodexPolicy {
    fn family(&self) -> AgentFamily {
        AgentFamily::Codex
    }

    fn render(
        &self,
        cli_path: &str,
        params: &SpawnParams,
        _bridge: Option<BridgeRef<'_>>,
    ) -> CommandSpec {
        let mut args = vec!["exec".to_owned()];
        if let Some(ref resume_id) = params.resume_session_id {
            args.push("resume".to_owned());
            args.push(resume_id.clone());
        }
        args.push("--json".to_owned());

        if let Some(ref model) = params.model {
            args.push("--model".to_owned());
            args.push(model.clone());
        }
        if let Some(ref sandbox) = params.sandbox {
            args.push("--sandbox".to_owned());
            args.push(sandbox.clone());
        }
        if let Some(ref dir) = params.working_directory {
            args.push("--cd".to_owned());
            args.push(dir.display().to_string());
        }
        if params.skip_git_check {
            args.push("--skip-git-repo-check".to_owned());
        }
        if params.bypass_approvals {
            args.push("--dangerously-bypass-approvals-and-sandbox".to_owned());
        }

        args.push(prompt_with_images(&params.prompt, &params.images));

        let cwd = params
            .working_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        CommandSpec {
            program: cli_path.to_owned(),
            args,
            cwd,
            env: Vec::new(),
            initial_stdin: None,
        }
    }

    fn decode_line(&self, line: &str) -> Result<Vec<AgentEvent>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let raw: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|err| AppError::Decode(format!("malformed event line: {err}")))?;
        let parsed: ThreadLine = serde_json::from_value(raw.clone())
            .map_err(|err| AppError::Decode(format!("unreadable event line: {err}")))?;

        let event = match parsed.tag.as_str() {
            "thread.started" => match parsed.thread_id {
                Some(session_id) => AgentEvent::Init {
                    session_id,
                    timestamp: None,
                },
                None => AgentEvent::Unknown {
                    tag: parsed.tag,
                    raw,
                },
            },
            "item.started" => {
                let name = parsed
                    .item
                    .as_ref()
                    .and_then(|i| i.item_type.clone())
                    .unwrap_or_else(|| "item".to_owned());
                AgentEvent::Stream {
                    inner: StreamEvent::ToolUseStart { name },
                }
            }
            "item.completed" => {
                let item_type = parsed.item.as_ref().and_then(|i| i.item_type.as_deref());
                if item_type == Some("agent_message") {
                    let text = parsed
                        .item
                        .as_ref()
                        .and_then(|i| i.text.clone())
                        .unwrap_or_default();
                    AgentEvent::Stream {
                        inner: StreamEvent::TextDelta { text },
                    }
                } else {
                    AgentEvent::Stream {
                        inner: StreamEvent::ToolUseStop,
                    }
                }
            }
            "turn.completed" => AgentEvent::TurnResult {
                status: TurnStatus::Success,
                text: None,
                metrics: Some(TurnMetrics {
                    cost_usd: None,
                    input_tokens: parsed.usage.as_ref().and_then(|u| u.input_tokens),
                    output_tokens: parsed.usage.as_ref().and_then(|u| u.output_tokens),
                    num_turns: None,
                }),
            },
            "turn.failed" => AgentEvent::TurnResult {
                status: TurnStatus::Error,
                text: parsed.error.and_then(|e| e.message),
                metrics: None,
            },
            "turn.aborted" => AgentEvent::TurnResult {
                status: TurnStatus::Interrupted,
                text: None,
                metrics: None,
            },
            _ => AgentEvent::Unknown {
                tag: parsed.tag,
                raw,
            },
        };

        Ok(vec![event])
    }

    fn approval_channel(&self) -> ApprovalChannel {
        ApprovalChannel::InlineIo
    }

    fn supports_live_stdin(&self) -> bool {
        false
    }

    fn followup_line(&self, _session_id: &str, _message: &str) -> Option<String> {
        None
    }

    fn is_approval_prompt(&self, line: &str) -> bool {
        approval_pattern().is_match(line)
    }

    fn index_layout(&self) -> IndexLayout {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        IndexLayout::DateTree(home.join(".codex").join("sessions"))
    }
}
