//! Approval mediation flows: operator answers, timeouts, and translation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::tempdir;

use agent_warden::agent::policy::AgentFamily;
use agent_warden::approval::bridge::PermissionRequest;
use agent_warden::models::question::QuestionKind;
use agent_warden::models::session::SessionStatus;
use agent_warden::orchestrator::manager::SessionManager;
use agent_warden::AppError;

use super::test_helpers::{
    long_running_body, manager_for_script, start_params, wait_for_status, write_agent_script,
};

async fn started_manager(
    session_id: &str,
    approval_timeout_ms: u64,
) -> (tempfile::TempDir, Arc<SessionManager>) {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(dir.path(), "agent.sh", &long_running_body(session_id));
    let manager = manager_for_script(&script, AgentFamily::Claude, approval_timeout_ms, 10);
    manager
        .start(start_params("Edit something", dir.path()))
        .await
        .expect("start must succeed");
    (dir, manager)
}

fn permission(session_id: &str, request_id: &str, tool: &str, input: serde_json::Value) -> PermissionRequest {
    PermissionRequest {
        session_id: session_id.to_owned(),
        tool_name: tool.to_owned(),
        tool_input: input,
        request_id: request_id.to_owned(),
    }
}

/// Operator allows a tool use; the agent receives `{behavior: allow}`.
#[tokio::test]
async fn tool_approval_allow_round_trip() {
    let (_dir, manager) = started_manager("real-a1", 300_000).await;

    let mediator = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .mediate_approval(permission(
                    "real-a1",
                    "req-1",
                    "Edit",
                    json!({ "file_path": "test.ts" }),
                ))
                .await
        })
    };

    let view = wait_for_status(
        &manager,
        "real-a1",
        SessionStatus::AwaitingInput,
        Duration::from_secs(5),
    )
    .await;
    let question = view.pending_question.expect("question must be pending");
    assert_eq!(question.id, "req-1");
    assert_eq!(question.kind, QuestionKind::ToolApproval);
    assert_eq!(question.questions[0].options, vec!["allow", "deny"]);
    assert!(question.questions[0].question.contains("test.ts"));

    let outcome = manager
        .respond("real-a1", "req-1", &["allow".to_owned()])
        .await
        .expect("respond must succeed");
    assert_eq!(outcome.status, SessionStatus::Active);

    let decision = mediator.await.expect("join").expect("mediate");
    assert_eq!(decision, json!({ "behavior": "allow" }));

    let view = manager.status("real-a1", None).await.expect("status");
    assert!(view.pending_question.is_none());
    manager.shutdown().await;
}

/// Scenario: no respond within the window; the agent is auto-denied.
#[tokio::test]
async fn unanswered_approval_times_out_to_deny() {
    let (_dir, manager) = started_manager("real-a2", 500).await;

    let mediator = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .mediate_approval(permission(
                    "real-a2",
                    "req-2",
                    "Edit",
                    json!({ "file_path": "test.ts" }),
                ))
                .await
        })
    };

    // During the window the session is awaiting input with allow/deny.
    let view = wait_for_status(
        &manager,
        "real-a2",
        SessionStatus::AwaitingInput,
        Duration::from_secs(5),
    )
    .await;
    assert_eq!(
        view.pending_question.expect("pending").questions[0].options,
        vec!["allow", "deny"]
    );

    let decision = mediator.await.expect("join").expect("mediate");
    assert_eq!(decision["behavior"], "deny");
    assert!(
        decision["message"].as_str().expect("message").contains("timed out"),
        "auto-deny must say it timed out: {decision}"
    );

    // After the window: back to ACTIVE, nothing pending.
    let view = wait_for_status(
        &manager,
        "real-a2",
        SessionStatus::Active,
        Duration::from_secs(5),
    )
    .await;
    assert!(view.pending_question.is_none());

    // A late respond must fail; the question is gone.
    let err = manager
        .respond("real-a2", "req-2", &["allow".to_owned()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoPendingQuestion(_)));
    manager.shutdown().await;
}

/// Scenario: plan rejection feedback reaches the agent verbatim.
#[tokio::test]
async fn plan_rejection_carries_feedback() {
    let (_dir, manager) = started_manager("real-a3", 300_000).await;

    let mediator = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .mediate_approval(permission(
                    "real-a3",
                    "req-3",
                    "ExitPlanMode",
                    json!({ "plan": "1. Refactor auth\n2. Add tests" }),
                ))
                .await
        })
    };

    let view = wait_for_status(
        &manager,
        "real-a3",
        SessionStatus::AwaitingInput,
        Duration::from_secs(5),
    )
    .await;
    let question = view.pending_question.expect("pending");
    assert_eq!(question.kind, QuestionKind::PlanApproval);
    assert_eq!(question.questions[0].options, vec!["approve", "reject"]);

    manager
        .respond(
            "real-a3",
            "req-3",
            &["reject: also cover the auth module".to_owned()],
        )
        .await
        .expect("respond must succeed");

    let decision = mediator.await.expect("join").expect("mediate");
    assert_eq!(decision["behavior"], "deny");
    assert_eq!(decision["message"], "also cover the auth module");
    manager.shutdown().await;
}

/// Scenario: multi-question answers merge into updatedInput.
#[tokio::test]
async fn multi_question_answers_round_trip() {
    let (_dir, manager) = started_manager("real-a4", 300_000).await;

    let input = json!({
        "questions": [
            { "question": "Which?", "options": ["OAuth2", "SAML"] },
            { "question": "Tests?", "options": ["Yes", "No"] }
        ]
    });
    let mediator = {
        let manager = Arc::clone(&manager);
        let input = input.clone();
        tokio::spawn(async move {
            manager
                .mediate_approval(permission("real-a4", "req-4", "AskUserQuestion", input))
                .await
        })
    };

    let view = wait_for_status(
        &manager,
        "real-a4",
        SessionStatus::AwaitingInput,
        Duration::from_secs(5),
    )
    .await;
    let question = view.pending_question.expect("pending");
    assert_eq!(question.kind, QuestionKind::Question);
    assert_eq!(question.questions.len(), 2);

    manager
        .respond(
            "real-a4",
            "req-4",
            &["OAuth2".to_owned(), "Yes".to_owned()],
        )
        .await
        .expect("respond must succeed");

    let decision = mediator.await.expect("join").expect("mediate");
    assert_eq!(decision["behavior"], "allow");
    assert_eq!(decision["updatedInput"]["questions"], input["questions"]);
    assert_eq!(decision["updatedInput"]["answers"], json!(["OAuth2", "Yes"]));
    manager.shutdown().await;
}

/// Respond guards: id mismatch and no-pending-question.
#[tokio::test]
async fn respond_guards_reject_bad_calls() {
    let (_dir, manager) = started_manager("real-a5", 300_000).await;

    // Nothing pending yet.
    let err = manager
        .respond("real-a5", "req-x", &["allow".to_owned()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoPendingQuestion(_)));

    let _mediator = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .mediate_approval(permission("real-a5", "req-5", "Bash", json!({ "command": "ls" })))
                .await
        })
    };
    wait_for_status(
        &manager,
        "real-a5",
        SessionStatus::AwaitingInput,
        Duration::from_secs(5),
    )
    .await;

    let err = manager
        .respond("real-a5", "wrong-id", &["allow".to_owned()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::QuestionIdMismatch(_)));

    let err = manager
        .respond("ghost-session", "req-5", &["allow".to_owned()])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownSession(_)));
    manager.shutdown().await;
}

/// A second overlapping approval is denied outright, not queued.
#[tokio::test]
async fn overlapping_approval_is_denied() {
    let (_dir, manager) = started_manager("real-a6", 300_000).await;

    let _first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .mediate_approval(permission("real-a6", "req-6", "Edit", json!({})))
                .await
        })
    };
    wait_for_status(
        &manager,
        "real-a6",
        SessionStatus::AwaitingInput,
        Duration::from_secs(5),
    )
    .await;

    let second = manager
        .mediate_approval(permission("real-a6", "req-7", "Bash", json!({})))
        .await
        .expect("second mediate returns a decision");
    assert_eq!(second["behavior"], "deny");

    // The original question is untouched.
    let view = manager.status("real-a6", None).await.expect("status");
    assert_eq!(view.pending_question.expect("pending").id, "req-6");
    manager.shutdown().await;
}
