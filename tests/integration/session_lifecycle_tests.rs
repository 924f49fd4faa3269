//! End-to-end session lifecycle against fake agent processes.

use std::time::Duration;

use tempfile::tempdir;

use agent_warden::agent::policy::AgentFamily;
use agent_warden::models::session::SessionStatus;
use agent_warden::AppError;

use super::test_helpers::{
    long_running_body, manager_for_script, start_params, wait_for_status, write_agent_script,
};

/// Happy path: init, one text delta, success result, clean exit.
#[tokio::test]
async fn start_returns_real_id_and_finishes_done() {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(
        dir.path(),
        "happy.sh",
        r#"printf '%s\n' '{"type":"system","subtype":"init","session_id":"real-1"}'
printf '%s\n' '{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"World!"}}}'
sleep 1
printf '%s\n' '{"type":"result","subtype":"success","result":"World!","total_cost_usd":0.01,"num_turns":1,"usage":{"input_tokens":5,"output_tokens":2}}'
exit 0"#,
    );
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 10);

    let outcome = manager
        .start(start_params("Hello", dir.path()))
        .await
        .expect("start must succeed");
    assert_eq!(outcome.session_id, "real-1", "real id must arrive in time");
    assert_eq!(outcome.status, SessionStatus::Active);

    let view = wait_for_status(&manager, "real-1", SessionStatus::Done, Duration::from_secs(5)).await;
    assert_eq!(view.result.as_deref(), Some("World!"));
    assert_eq!(view.recent_output, vec!["World!".to_owned()]);
    assert_eq!(view.metrics.cost_usd, Some(0.01));
    assert_eq!(view.metrics.num_turns, Some(1));
    assert!(view.pending_question.is_none());
}

/// After the init rekey, the temp id must no longer resolve.
#[tokio::test]
async fn temp_id_is_unreachable_after_rekey() {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(dir.path(), "agent.sh", &long_running_body("real-2"));
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 10);

    let outcome = manager
        .start(start_params("Hello", dir.path()))
        .await
        .expect("start must succeed");
    assert_eq!(outcome.session_id, "real-2");

    // Any temp-prefixed probe must miss; only the real id resolves.
    let err = manager.status("pending-whatever", None).await.unwrap_err();
    assert!(matches!(err, AppError::UnknownSession(_)));
    assert!(manager.status("real-2", None).await.is_ok());

    manager.shutdown().await;
}

/// Exit without a result event: code 0 maps to DONE.
#[tokio::test]
async fn clean_exit_without_result_is_done() {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(
        dir.path(),
        "quiet.sh",
        r#"printf '%s\n' '{"type":"system","subtype":"init","session_id":"real-3"}'
exit 0"#,
    );
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 10);

    manager
        .start(start_params("Hello", dir.path()))
        .await
        .expect("start must succeed");
    wait_for_status(&manager, "real-3", SessionStatus::Done, Duration::from_secs(5)).await;
}

/// Exit with a non-zero code and no result maps to ERROR with the code.
#[tokio::test]
async fn nonzero_exit_is_error_with_code() {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(
        dir.path(),
        "broken.sh",
        r#"printf '%s\n' '{"type":"system","subtype":"init","session_id":"real-4"}'
exit 3"#,
    );
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 10);

    manager
        .start(start_params("Hello", dir.path()))
        .await
        .expect("start must succeed");
    let view =
        wait_for_status(&manager, "real-4", SessionStatus::Error, Duration::from_secs(5)).await;
    assert!(
        view.error.as_deref().unwrap_or_default().contains("code 3"),
        "error must carry the exit code: {:?}",
        view.error
    );
}

/// A missing executable surfaces as a spawn failure and an ERROR session.
#[tokio::test]
async fn missing_binary_fails_start() {
    let dir = tempdir().expect("tempdir");
    let script = dir.path().join("does-not-exist.sh");
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 10);

    let err = manager
        .start(start_params("Hello", dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SpawnFailed(_)), "got: {err:?}");
}

/// A result event wins over the exit handler (Result precedence).
#[tokio::test]
async fn result_status_survives_process_exit() {
    let dir = tempdir().expect("tempdir");
    // Error result, but exit code 0: the result must win.
    let script = write_agent_script(
        dir.path(),
        "contradict.sh",
        r#"printf '%s\n' '{"type":"system","subtype":"init","session_id":"real-5"}'
printf '%s\n' '{"type":"result","subtype":"error_during_execution","result":"turn failed"}'
sleep 0.3
exit 0"#,
    );
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 10);

    manager
        .start(start_params("Hello", dir.path()))
        .await
        .expect("start must succeed");
    let view =
        wait_for_status(&manager, "real-5", SessionStatus::Error, Duration::from_secs(5)).await;
    assert_eq!(view.error.as_deref(), Some("turn failed"));

    // Give the exit handler time to run, then confirm it did not override.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let view = manager.status("real-5", None).await.expect("status");
    assert_eq!(view.status, SessionStatus::Error, "exit must not override a result");
}

/// Tool-use boundaries from the stream land in the status view.
#[tokio::test]
async fn tool_uses_are_tracked() {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(
        dir.path(),
        "tools.sh",
        r#"printf '%s\n' '{"type":"system","subtype":"init","session_id":"real-6"}'
printf '%s\n' '{"type":"stream_event","event":{"type":"content_block_start","content_block":{"type":"tool_use","name":"Bash"}}}'
printf '%s\n' '{"type":"stream_event","event":{"type":"content_block_stop"}}'
printf '%s\n' '{"type":"stream_event","event":{"type":"content_block_start","content_block":{"type":"tool_use","name":"Edit"}}}'
exec sleep 30"#,
    );
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 10);

    manager
        .start(start_params("Hello", dir.path()))
        .await
        .expect("start must succeed");

    // Wait for the stream to be ingested.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let view = manager.status("real-6", None).await.expect("status");
        if view.tool_use_events.len() == 2 {
            assert_eq!(view.tool_use_events[0].name, "Bash");
            assert_eq!(
                view.tool_use_events[0].status,
                agent_warden::models::session::ToolUseStatus::Completed
            );
            assert_eq!(view.tool_use_events[1].name, "Edit");
            assert_eq!(
                view.tool_use_events[1].status,
                agent_warden::models::session::ToolUseStatus::Running
            );
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for tool uses"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    manager.shutdown().await;
}

/// Live-stdin follow-up leaves the session ACTIVE without a respawn.
#[tokio::test]
async fn say_over_live_stdin_keeps_the_process() {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(dir.path(), "agent.sh", &long_running_body("real-7"));
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 10);

    manager
        .start(start_params("Hello", dir.path()))
        .await
        .expect("start must succeed");

    let outcome = manager
        .say("real-7", "more please", Default::default())
        .await
        .expect("live follow-up must succeed");
    assert_eq!(outcome.status, SessionStatus::Active);
    assert_eq!(manager.store().count_active().await, 1, "no second process");

    manager.shutdown().await;
}

/// One-process-per-turn family: say against a live process is Busy.
#[tokio::test]
async fn codex_family_say_while_running_is_busy() {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(
        dir.path(),
        "codex.sh",
        r#"printf '%s\n' '{"type":"thread.started","thread_id":"th-1"}'
exec sleep 30"#,
    );
    let manager = manager_for_script(&script, AgentFamily::Codex, 300_000, 10);

    manager
        .start(start_params("Hello", dir.path()))
        .await
        .expect("start must succeed");

    let err = manager
        .say("th-1", "hurry up", Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Busy(_)), "got: {err:?}");

    manager.shutdown().await;
}
