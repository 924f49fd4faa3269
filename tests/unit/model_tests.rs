//! Unit tests for session and question models.

use serde_json::json;

use agent_warden::agent::event::TurnMetrics;
use agent_warden::models::question::{PendingQuestion, QuestionItem, QuestionKind};
use agent_warden::models::session::{
    is_temp_id, temp_id, Session, SessionMetrics, SessionStatus, SpawnParams, ToolUseRecord,
    ToolUseStatus,
};

#[test]
fn temp_ids_are_unique_and_recognizable() {
    let a = temp_id();
    let b = temp_id();
    assert_ne!(a, b);
    assert!(is_temp_id(&a));
    assert!(!is_temp_id("sess-real-123"));
}

#[test]
fn terminal_statuses() {
    assert!(SessionStatus::Done.is_terminal());
    assert!(SessionStatus::Error.is_terminal());
    assert!(SessionStatus::Interrupted.is_terminal());
    assert!(!SessionStatus::Active.is_terminal());
    assert!(!SessionStatus::AwaitingInput.is_terminal());
}

#[test]
fn status_serializes_snake_case() {
    let json = serde_json::to_string(&SessionStatus::AwaitingInput).expect("serialize");
    assert_eq!(json, "\"awaiting_input\"");
}

#[test]
fn new_session_starts_active_and_empty() {
    let session = Session::new(temp_id(), SpawnParams::default(), 16);
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.process.is_none());
    assert!(session.pending_question.is_none());
    assert!(session.history.is_empty());
    assert!(session.tool_uses.is_empty());
    assert!(!session.result_seen);
}

#[test]
fn placeholder_session_is_done() {
    let session = Session::placeholder("adopted-1".to_owned(), SpawnParams::default(), 16);
    assert_eq!(session.status, SessionStatus::Done);
    assert_eq!(session.id, "adopted-1");
}

#[test]
fn complete_last_tool_use_targets_most_recent_running() {
    let mut session = Session::new(temp_id(), SpawnParams::default(), 16);
    session.tool_uses.push(ToolUseRecord {
        name: "Bash".to_owned(),
        status: ToolUseStatus::Completed,
    });
    session.tool_uses.push(ToolUseRecord {
        name: "Edit".to_owned(),
        status: ToolUseStatus::Running,
    });
    session.tool_uses.push(ToolUseRecord {
        name: "Read".to_owned(),
        status: ToolUseStatus::Running,
    });

    session.complete_last_tool_use();

    assert_eq!(session.tool_uses[1].status, ToolUseStatus::Running);
    assert_eq!(session.tool_uses[2].status, ToolUseStatus::Completed);
}

#[test]
fn deny_tool_use_marks_running_by_name() {
    let mut session = Session::new(temp_id(), SpawnParams::default(), 16);
    session.tool_uses.push(ToolUseRecord {
        name: "Edit".to_owned(),
        status: ToolUseStatus::Running,
    });
    session.tool_uses.push(ToolUseRecord {
        name: "Bash".to_owned(),
        status: ToolUseStatus::Running,
    });

    session.deny_tool_use("Edit");

    assert_eq!(session.tool_uses[0].status, ToolUseStatus::Denied);
    assert_eq!(session.tool_uses[1].status, ToolUseStatus::Running);
}

#[test]
fn metrics_absorb_accumulates() {
    let mut metrics = SessionMetrics::default();
    metrics.absorb(&TurnMetrics {
        cost_usd: Some(0.01),
        input_tokens: Some(100),
        output_tokens: Some(20),
        num_turns: Some(1),
    });
    metrics.absorb(&TurnMetrics {
        cost_usd: Some(0.02),
        input_tokens: Some(50),
        output_tokens: None,
        num_turns: Some(3),
    });

    assert!((metrics.cost_usd.unwrap() - 0.03).abs() < 1e-9);
    assert_eq!(metrics.input_tokens, Some(150));
    assert_eq!(metrics.output_tokens, Some(20));
    assert_eq!(metrics.num_turns, Some(3));
}

#[test]
fn question_view_exposes_no_raw_input() {
    let question = PendingQuestion {
        id: "req-1".to_owned(),
        kind: QuestionKind::ToolApproval,
        questions: vec![QuestionItem {
            question: "Allow Edit?".to_owned(),
            options: vec!["allow".to_owned(), "deny".to_owned()],
        }],
        original_input: json!({ "file_path": "secret.ts", "content": "..." }),
        tool_name: "Edit".to_owned(),
        asked_at: chrono::Utc::now(),
    };

    let view = question.view();
    assert_eq!(view.id, "req-1");
    assert_eq!(view.kind, QuestionKind::ToolApproval);
    assert_eq!(view.questions.len(), 1);

    let serialized = serde_json::to_string(&view).expect("serialize");
    assert!(
        !serialized.contains("secret.ts"),
        "operator view must not leak the raw tool input"
    );
}

#[test]
fn spawn_params_deserialize_with_defaults() {
    let params: SpawnParams = serde_json::from_value(json!({ "prompt": "hi" })).expect("parse");
    assert_eq!(params.prompt, "hi");
    assert!(params.allowed_tools.is_empty());
    assert!(!params.bypass_approvals);
    assert!(params.resume_session_id.is_none());
}
