//! Live-session capacity enforcement.

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use agent_warden::agent::policy::AgentFamily;
use agent_warden::AppError;

use super::test_helpers::{
    long_running_unique_body, manager_for_script, start_params, wait_until_reaped,
    write_agent_script,
};

/// Scenario: with `max_sessions = 1` the second start is rejected, and
/// capacity frees up once the first process is gone.
#[tokio::test]
async fn capacity_limits_live_sessions() {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(dir.path(), "agent.sh", &long_running_unique_body());
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 1);

    let first = manager
        .start(start_params("one", dir.path()))
        .await
        .expect("first start must succeed");

    let err = manager
        .start(start_params("two", dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded(_)), "got: {err:?}");

    manager.interrupt(&first.session_id).await.expect("interrupt");
    wait_until_reaped(&manager, Duration::from_secs(5)).await;

    manager
        .start(start_params("three", dir.path()))
        .await
        .expect("start must succeed after capacity frees");

    manager.shutdown().await;
}

/// Concurrent starts racing for the last slot: exactly one wins, and the
/// live count never exceeds the cap.
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_starts_respect_the_cap() {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(dir.path(), "agent.sh", &long_running_unique_body());
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 1);

    let mut handles = Vec::new();
    for prompt in ["one", "two", "three", "four"] {
        let manager = Arc::clone(&manager);
        let params = start_params(prompt, dir.path());
        handles.push(tokio::spawn(async move { manager.start(params).await }));
    }

    let mut ok = 0usize;
    let mut capacity_rejected = 0usize;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => ok += 1,
            Err(AppError::CapacityExceeded(_)) => capacity_rejected += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(ok, 1, "exactly one start may claim the single slot");
    assert_eq!(capacity_rejected, 3);
    assert_eq!(manager.store().count_active().await, 1);

    manager.shutdown().await;
}

/// Terminal sessions do not count against the cap.
#[tokio::test]
async fn terminal_sessions_do_not_count() {
    let dir = tempdir().expect("tempdir");
    let script = write_agent_script(
        dir.path(),
        "quick.sh",
        r#"printf '%s\n' "{\"type\":\"system\",\"subtype\":\"init\",\"session_id\":\"real-$$\"}"
printf '%s\n' '{"type":"result","subtype":"success","result":"ok"}'
exit 0"#,
    );
    let manager = manager_for_script(&script, AgentFamily::Claude, 300_000, 1);

    for prompt in ["a", "b", "c"] {
        manager
            .start(start_params(prompt, dir.path()))
            .await
            .expect("start must succeed");
        wait_until_reaped(&manager, Duration::from_secs(5)).await;
    }
}
