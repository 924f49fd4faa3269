//! Pending operator questions raised by agent approval requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of question kinds the classifier can produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Permission to run a tool. Options: allow, deny.
    ToolApproval,
    /// Permission to leave plan mode. Options: approve, reject.
    PlanApproval,
    /// The agent is asking the operator one or more questions.
    Question,
    /// Inline-family command execution approval. Options: approve, deny.
    CommandApproval,
    /// Inline-family file modification approval. Options: approve, deny.
    PatchApproval,
}

/// One operator-facing question with its allowed decision tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionItem {
    pub question: String,
    pub options: Vec<String>,
}

/// An approval request awaiting an operator decision.
///
/// The resolver lives in the question registry keyed by `id`; it never
/// appears here and never leaves the supervisor.
#[derive(Debug, Clone)]
pub struct PendingQuestion {
    /// Token supplied by the agent's approval path.
    pub id: String,
    pub kind: QuestionKind,
    /// Ordered operator-facing questions.
    pub questions: Vec<QuestionItem>,
    /// Raw tool input, retained for answer translation.
    pub original_input: serde_json::Value,
    /// Tool name that triggered the request (empty for inline prompts).
    pub tool_name: String,
    pub asked_at: DateTime<Utc>,
}

impl PendingQuestion {
    /// Operator-facing view, stripped of the raw input and any internals.
    #[must_use]
    pub fn view(&self) -> PendingQuestionView {
        PendingQuestionView {
            id: self.id.clone(),
            kind: self.kind,
            questions: self.questions.clone(),
        }
    }
}

/// What the `status` operation exposes about a pending question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingQuestionView {
    pub id: String,
    pub kind: QuestionKind,
    pub questions: Vec<QuestionItem>,
}
