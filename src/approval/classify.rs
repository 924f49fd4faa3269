//! Approval classification and answer translation.
//!
//! This is the single point where an agent family's approval vocabulary is
//! interpreted: the request's tool name (or free-form prompt) maps into the
//! closed [`QuestionKind`] set, an operator-facing question is synthesized,
//! and the operator's eventual answers translate back into the response
//! shape the agent expects.

use serde_json::{json, Value};

use crate::approval::answer::parse_answer;
use crate::models::question::{QuestionItem, QuestionKind};

/// Cap on how much of a tool input value the question summary shows.
const SUMMARY_MAX_CHARS: usize = 100;

/// Input keys worth surfacing in a one-line tool summary, in priority order.
const SUMMARY_KEYS: [&str; 7] = [
    "command",
    "file_path",
    "path",
    "pattern",
    "query",
    "url",
    "content",
];

/// Classify a callback-bridge approval request by tool name.
#[must_use]
pub fn classify_tool(tool_name: &str) -> QuestionKind {
    match tool_name {
        "ExitPlanMode" | "exit_plan_mode" => QuestionKind::PlanApproval,
        "AskUserQuestion" | "ask_user_question" => QuestionKind::Question,
        _ => QuestionKind::ToolApproval,
    }
}

/// Classify an inline-family approval prompt by its wording.
///
/// File-touching vocabulary marks a patch approval; everything else is a
/// command approval.
#[must_use]
pub fn classify_prompt(prompt: &str) -> QuestionKind {
    let lower = prompt.to_ascii_lowercase();
    let patch_words = ["patch", "apply", "modify", "delete", "create", "write"];
    if patch_words.iter().any(|w| lower.contains(w)) {
        QuestionKind::PatchApproval
    } else {
        QuestionKind::CommandApproval
    }
}

/// Synthesize operator-facing questions for a bridge approval request.
#[must_use]
pub fn synthesize(kind: QuestionKind, tool_name: &str, input: &Value) -> Vec<QuestionItem> {
    match kind {
        QuestionKind::ToolApproval => {
            let question = match summarize_input(input) {
                Some(summary) => format!("Allow {tool_name}: {summary}?"),
                None => format!("Allow {tool_name}?"),
            };
            vec![QuestionItem {
                question,
                options: vec!["allow".to_owned(), "deny".to_owned()],
            }]
        }
        QuestionKind::PlanApproval => {
            let plan = input
                .get("plan")
                .and_then(|p| p.as_str())
                .map(str::to_owned)
                .unwrap_or_else(|| {
                    serde_json::to_string_pretty(input).unwrap_or_default()
                });
            vec![QuestionItem {
                question: format!("Approve this plan?\n{plan}"),
                options: vec!["approve".to_owned(), "reject".to_owned()],
            }]
        }
        QuestionKind::Question => sub_questions(input),
        QuestionKind::CommandApproval | QuestionKind::PatchApproval => {
            vec![QuestionItem {
                question: tool_name.to_owned(),
                options: vec!["approve".to_owned(), "deny".to_owned()],
            }]
        }
    }
}

/// Synthesize the single question for an inline stderr prompt.
#[must_use]
pub fn synthesize_inline(kind: QuestionKind, prompt: &str) -> Vec<QuestionItem> {
    synthesize(kind, prompt, &Value::Null)
}

/// Translate operator answers into the agent-facing response payload.
#[must_use]
pub fn translate(kind: QuestionKind, original_input: &Value, answers: &[String]) -> Value {
    let first = parse_answer(answers.first().map(String::as_str).unwrap_or_default());

    match kind {
        QuestionKind::ToolApproval => {
            if first.decision == "allow" {
                json!({ "behavior": "allow" })
            } else {
                deny(first.reason)
            }
        }
        QuestionKind::PlanApproval => {
            if first.decision == "approve" {
                json!({ "behavior": "allow", "updatedInput": original_input })
            } else {
                deny(first.reason)
            }
        }
        QuestionKind::Question => {
            let mut updated = original_input.clone();
            if !updated.is_object() {
                updated = json!({});
            }
            if let Some(map) = updated.as_object_mut() {
                map.insert("answers".to_owned(), json!(answers));
            }
            json!({ "behavior": "allow", "updatedInput": updated })
        }
        QuestionKind::CommandApproval | QuestionKind::PatchApproval => {
            let approved = matches!(first.decision.as_str(), "approve" | "allow" | "yes");
            let mut out = json!({ "approved": approved });
            if let (Some(reason), Some(map)) = (first.reason, out.as_object_mut()) {
                map.insert("reason".to_owned(), json!(reason));
            }
            out
        }
    }
}

/// The deny payload delivered when a question times out unanswered.
#[must_use]
pub fn timeout_deny(kind: QuestionKind) -> Value {
    let message = "approval timed out before an operator responded";
    match kind {
        QuestionKind::CommandApproval | QuestionKind::PatchApproval => {
            json!({ "approved": false, "reason": message })
        }
        _ => json!({ "behavior": "deny", "message": message }),
    }
}

/// Whether a translated response is a denial.
#[must_use]
pub fn is_denial(response: &Value) -> bool {
    response.get("behavior").and_then(|b| b.as_str()) == Some("deny")
        || response.get("approved").and_then(|a| a.as_bool()) == Some(false)
}

fn deny(reason: Option<String>) -> Value {
    match reason {
        Some(reason) if !reason.is_empty() => json!({ "behavior": "deny", "message": reason }),
        _ => json!({ "behavior": "deny" }),
    }
}

/// One-line summary of a tool input, picked from a small known-key list.
fn summarize_input(input: &Value) -> Option<String> {
    let object = input.as_object()?;
    for key in SUMMARY_KEYS {
        if let Some(value) = object.get(key).and_then(|v| v.as_str()) {
            let mut summary: String = value.chars().take(SUMMARY_MAX_CHARS).collect();
            if value.chars().count() > SUMMARY_MAX_CHARS {
                summary.push('…');
            }
            return Some(summary);
        }
    }
    None
}

/// Pass through the agent-supplied sub-questions verbatim.
///
/// Option entries may be bare strings or `{label, description}` objects;
/// both forms reduce to their label.
fn sub_questions(input: &Value) -> Vec<QuestionItem> {
    let Some(list) = input.get("questions").and_then(|q| q.as_array()) else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|entry| {
            let question = entry.get("question").and_then(|q| q.as_str())?;
            let options = entry
                .get("options")
                .and_then(|o| o.as_array())
                .map(|opts| {
                    opts.iter()
                        .filter_map(|o| {
                            o.as_str()
                                .or_else(|| o.get("label").and_then(|l| l.as_str()))
                                .map(str::to_owned)
                        })
                        .collect()
                })
                .unwrap_or_default();
            Some(QuestionItem {
                question: question.to_owned(),
                options,
            })
        })
        .collect()
}
