//! Claude-family spawn policy.
//!
//! Claude runs as a long-lived process emitting `stream-json` lines on
//! stdout and accepting follow-up user messages on stdin. Approvals reach
//! the supervisor through the callback bridge: the CLI is pointed at the
//! auxiliary `agent-warden-permission` program via `--permission-prompt-tool`
//! and an inline MCP server config.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::agent::event::{AgentEvent, StreamEvent, TurnMetrics, TurnStatus};
use crate::agent::policy::{
    prompt_with_images, AgentFamily, ApprovalChannel, BridgeRef, CommandSpec, IndexLayout,
    SpawnPolicy,
};
use crate::models::session::{PermissionMode, SpawnParams};
use crate::{AppError, Result};

/// Tool name claude exposes for the permission prompt, as seen from the
/// agent's MCP config (`mcp__<server>__<tool>`).
const PERMISSION_TOOL: &str = "mcp__warden__approve";

/// Raw `stream-json` line shape. Only the fields the supervisor reads are
/// modeled; loosely-typed fields stay as raw values so a shape surprise in
/// one field cannot drop the whole line.
#[derive(Debug, Deserialize)]
struct StreamJsonLine {
    #[serde(rename = "type", default)]
    tag: String,
    subtype: Option<String>,
    session_id: Option<String>,
    timestamp: Option<serde_json::Value>,
    event: Option<serde_json::Value>,
    message: Option<serde_json::Value>,
    result: Option<serde_json::Value>,
    total_cost_usd: Option<f64>,
    num_turns: Option<u32>,
    usage: Option<serde_json::Value>,
}

fn rfc3339(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    value?
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Spawn policy for the claude CLI.
pub struct ClaudePolicy;

impl ClaudePolicy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClaudePolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn permission_mode_value(mode: PermissionMode) -> &'static str {
    match mode {
        PermissionMode::Default => "default",
        PermissionMode::AcceptEdits => "acceptEdits",
        PermissionMode::Plan => "plan",
        PermissionMode::BypassPermissions => "bypassPermissions",
    }
}

/// Path to the auxiliary permission forwarder.
///
/// Prefers a sibling of the running supervisor binary so a relocated
/// install keeps working; falls back to PATH lookup by name.
fn permission_program() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| {
            exe.parent()
                .map(|dir| dir.join("agent-warden-permission"))
        })
        .filter(|p| p.exists())
        .map_or_else(
            || "agent-warden-permission".to_owned(),
            |p| p.display().to_string(),
        )
}

impl SpawnPolicy for ClaudePolicy {
    fn family(&self) -> AgentFamily {
        AgentFamily::Claude
    }

    fn render(
        &self,
        cli_path: &str,
        params: &SpawnParams,
        bridge: Option<BridgeRef<'_>>,
    ) -> CommandSpec {
        let mut args = vec![
            "-p".to_owned(),
            "--output-format".to_owned(),
            "stream-json".to_owned(),
            "--input-format".to_owned(),
            "stream-json".to_owned(),
            "--include-partial-messages".to_owned(),
            "--verbose".to_owned(),
        ];

        if let Some(ref model) = params.model {
            args.push("--model".to_owned());
            args.push(model.clone());
        }
        if let Some(mode) = params.permission_mode {
            args.push("--permission-mode".to_owned());
            args.push(permission_mode_value(mode).to_owned());
        }
        if !params.allowed_tools.is_empty() {
            args.push("--allowed-tools".to_owned());
            args.push(params.allowed_tools.join(","));
        }
        if !params.disallowed_tools.is_empty() {
            args.push("--disallowed-tools".to_owned());
            args.push(params.disallowed_tools.join(","));
        }
        if let Some(max_turns) = params.max_turns {
            args.push("--max-turns".to_owned());
            args.push(max_turns.to_string());
        }
        if let Some(ref system_prompt) = params.system_prompt {
            args.push("--append-system-prompt".to_owned());
            args.push(system_prompt.clone());
        }
        if let Some(ref resume_id) = params.resume_session_id {
            args.push("--resume".to_owned());
            args.push(resume_id.clone());
        }

        if params.bypass_approvals {
            args.push("--dangerously-skip-permissions".to_owned());
        } else if let Some(bridge) = bridge {
            let mcp_config = serde_json::json!({
                "mcpServers": {
                    "warden": {
                        "command": permission_program(),
                        "args": ["--endpoint", bridge.endpoint],
                        "env": { "WARDEN_SESSION_LABEL": bridge.session_label }
                    }
                }
            });
            args.push("--permission-prompt-tool".to_owned());
            args.push(PERMISSION_TOOL.to_owned());
            args.push("--mcp-config".to_owned());
            args.push(mcp_config.to_string());
        }

        let prompt = prompt_with_images(&params.prompt, &params.images);
        let initial = serde_json::json!({ "role": "user", "content": prompt });

        let cwd = params
            .working_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        CommandSpec {
            program: cli_path.to_owned(),
            args,
            cwd,
            env: Vec::new(),
            initial_stdin: Some(initial.to_string()),
        }
    }

    fn decode_line(&self, line: &str) -> Result<Vec<AgentEvent>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let raw: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|err| AppError::Decode(format!("malformed event line: {err}")))?;
        let parsed: StreamJsonLine = serde_json::from_value(raw.clone())
            .map_err(|err| AppError::Decode(format!("unreadable event line: {err}")))?;

        match parsed.tag.as_str() {
            "system" if parsed.subtype.as_deref() == Some("init") => {
                let timestamp = rfc3339(parsed.timestamp.as_ref());
                let Some(session_id) = parsed.session_id else {
                    return Ok(vec![unknown(parsed.tag, raw)]);
                };
                Ok(vec![AgentEvent::Init {
                    session_id,
                    timestamp,
                }])
            }
            "stream_event" => Ok(decode_stream_event(parsed.event.as_ref(), &raw)),
            "assistant" => Ok(decode_assistant(parsed.message.as_ref())),
            "result" => Ok(vec![decode_result(&parsed)]),
            _ => Ok(vec![unknown(parsed.tag, raw)]),
        }
    }

    fn approval_channel(&self) -> ApprovalChannel {
        ApprovalChannel::CallbackBridge
    }

    fn supports_live_stdin(&self) -> bool {
        true
    }

    fn followup_line(&self, session_id: &str, message: &str) -> Option<String> {
        Some(
            serde_json::json!({
                "role": "user",
                "content": message,
                "session_id": session_id,
            })
            .to_string(),
        )
    }

    fn is_approval_prompt(&self, _line: &str) -> bool {
        false
    }

    fn index_layout(&self) -> IndexLayout {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        IndexLayout::JsonlFile(home.join(".claude").join("history.jsonl"))
    }
}

fn unknown(tag: String, raw: serde_json::Value) -> AgentEvent {
    AgentEvent::Unknown { tag, raw }
}

/// Decode a `stream_event` wrapper: text deltas and tool-use boundaries.
fn decode_stream_event(event: Option<&serde_json::Value>, raw: &serde_json::Value) -> Vec<AgentEvent> {
    let Some(event) = event else {
        return vec![unknown("stream_event".into(), raw.clone())];
    };
    let inner = match event.get("type").and_then(|t| t.as_str()) {
        Some("content_block_delta") => event
            .pointer("/delta/text")
            .and_then(|t| t.as_str())
            .map(|text| StreamEvent::TextDelta {
                text: text.to_owned(),
            }),
        Some("content_block_start") => {
            let block = event.get("content_block");
            match block.and_then(|b| b.get("type")).and_then(|t| t.as_str()) {
                Some("tool_use") => block
                    .and_then(|b| b.get("name"))
                    .and_then(|n| n.as_str())
                    .map(|name| StreamEvent::ToolUseStart {
                        name: name.to_owned(),
                    }),
                _ => None,
            }
        }
        Some("content_block_stop") => Some(StreamEvent::ToolUseStop),
        _ => None,
    };

    match inner {
        Some(inner) => vec![AgentEvent::Stream { inner }],
        None => {
            let tag = event
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("stream_event");
            vec![AgentEvent::Stream {
                inner: StreamEvent::Other {
                    tag: tag.to_owned(),
                },
            }]
        }
    }
}

/// Decode a complete `assistant` message into its content-block events.
fn decode_assistant(message: Option<&serde_json::Value>) -> Vec<AgentEvent> {
    let Some(blocks) = message
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_array())
    else {
        return Vec::new();
    };

    let mut events = Vec::new();
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                    if !text.trim().is_empty() {
                        events.push(AgentEvent::Stream {
                            inner: StreamEvent::TextDelta {
                                text: text.to_owned(),
                            },
                        });
                    }
                }
            }
            Some("tool_use") => {
                let name = block
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or("Unknown");
                events.push(AgentEvent::Stream {
                    inner: StreamEvent::ToolUseStart {
                        name: name.to_owned(),
                    },
                });
            }
            _ => {}
        }
    }
    events
}

fn decode_result(parsed: &StreamJsonLine) -> AgentEvent {
    let subtype = parsed.subtype.as_deref().unwrap_or("success");
    let status = if subtype == "success" {
        TurnStatus::Success
    } else if subtype.contains("interrupt") || subtype.contains("cancel") {
        TurnStatus::Interrupted
    } else {
        TurnStatus::Error
    };

    let usage_field = |key: &str| {
        parsed
            .usage
            .as_ref()
            .and_then(|u| u.get(key))
            .and_then(serde_json::Value::as_u64)
    };
    let metrics = TurnMetrics {
        cost_usd: parsed.total_cost_usd,
        input_tokens: usage_field("input_tokens"),
        output_tokens: usage_field("output_tokens"),
        num_turns: parsed.num_turns,
    };

    // The result text is normally a string; anything else is kept as its
    // JSON rendering rather than discarded.
    let text = parsed.result.as_ref().map(|r| match r.as_str() {
        Some(s) => s.to_owned(),
        None => r.to_string(),
    });

    AgentEvent::TurnResult {
        status,
        text,
        metrics: Some(metrics),
    }
}
