//! Typed event sum for agent output streams.
//!
//! Every line an agent writes to stdout decodes to exactly one
//! [`AgentEvent`]. Unrecognized discriminators are preserved as
//! [`AgentEvent::Unknown`] rather than dropped, so the ring history keeps a
//! faithful record of the stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome reported by a turn-terminating `Result` event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Success,
    Error,
    Interrupted,
}

/// Metrics carried by a single turn result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TurnMetrics {
    pub cost_usd: Option<f64>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub num_turns: Option<u32>,
}

/// Inner payload of a streaming event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Human-readable output chunk.
    TextDelta { text: String },
    /// A tool invocation began.
    ToolUseStart { name: String },
    /// The most recent tool invocation finished.
    ToolUseStop,
    /// A streaming payload the supervisor does not interpret.
    Other { tag: String },
}

/// One decoded event from an agent's stdout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// First event of a fresh spawn; carries the agent-assigned session id.
    Init {
        session_id: String,
        timestamp: Option<DateTime<Utc>>,
    },
    /// A chunk of agent output.
    Stream { inner: StreamEvent },
    /// The current turn ended.
    TurnResult {
        status: TurnStatus,
        text: Option<String>,
        metrics: Option<TurnMetrics>,
    },
    /// Anything else, preserved raw.
    Unknown {
        tag: String,
        raw: serde_json::Value,
    },
}

impl AgentEvent {
    /// The text of a `Stream(TextDelta)` event, if that is what this is.
    #[must_use]
    pub fn as_text_delta(&self) -> Option<&str> {
        match self {
            Self::Stream {
                inner: StreamEvent::TextDelta { text },
            } => Some(text),
            _ => None,
        }
    }
}
