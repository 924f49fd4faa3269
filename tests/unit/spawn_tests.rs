//! Unit tests for argv rendering across agent families.

use std::path::PathBuf;

use agent_warden::agent::claude::ClaudePolicy;
use agent_warden::agent::codex::CodexPolicy;
use agent_warden::agent::policy::{
    prompt_with_images, ApprovalChannel, BridgeRef, SpawnPolicy,
};
use agent_warden::models::session::{PermissionMode, SpawnParams};

fn base_params(prompt: &str) -> SpawnParams {
    SpawnParams {
        prompt: prompt.to_owned(),
        working_directory: Some(PathBuf::from("/tmp/project")),
        ..SpawnParams::default()
    }
}

// ── Claude rendering ────────────────────────────────────────────────────────

#[test]
fn claude_mandatory_flags_always_present() {
    let spec = ClaudePolicy::new().render("claude", &base_params("Hello"), None);

    assert_eq!(spec.program, "claude");
    for flag in ["-p", "--output-format", "stream-json", "--input-format", "--verbose"] {
        assert!(
            spec.args.iter().any(|a| a == flag),
            "missing mandatory flag {flag}: {:?}",
            spec.args
        );
    }
    assert_eq!(spec.cwd, PathBuf::from("/tmp/project"));
}

#[test]
fn claude_prompt_goes_to_initial_stdin() {
    let spec = ClaudePolicy::new().render("claude", &base_params("Hello"), None);
    let line = spec.initial_stdin.expect("claude takes the prompt on stdin");
    let value: serde_json::Value = serde_json::from_str(&line).expect("valid json");
    assert_eq!(value["role"], "user");
    assert_eq!(value["content"], "Hello");
}

#[test]
fn claude_optional_flags_omitted_when_unset() {
    let spec = ClaudePolicy::new().render("claude", &base_params("Hi"), None);
    for flag in [
        "--model",
        "--permission-mode",
        "--allowed-tools",
        "--disallowed-tools",
        "--max-turns",
        "--append-system-prompt",
        "--resume",
        "--dangerously-skip-permissions",
        "--permission-prompt-tool",
    ] {
        assert!(
            !spec.args.iter().any(|a| a == flag),
            "flag {flag} must be omitted when its param is unset"
        );
    }
}

#[test]
fn claude_optional_flags_render_when_set() {
    let mut params = base_params("Hi");
    params.model = Some("opus".to_owned());
    params.permission_mode = Some(PermissionMode::Plan);
    params.allowed_tools = vec!["Bash".to_owned(), "Edit".to_owned()];
    params.max_turns = Some(12);
    params.system_prompt = Some("be terse".to_owned());

    let spec = ClaudePolicy::new().render("claude", &params, None);
    let args = spec.args.join(" ");
    assert!(args.contains("--model opus"));
    assert!(args.contains("--permission-mode plan"));
    assert!(args.contains("--allowed-tools Bash,Edit"));
    assert!(args.contains("--max-turns 12"));
    assert!(args.contains("--append-system-prompt be terse"));
}

#[test]
fn claude_resume_renders_resume_flag() {
    let mut params = base_params("follow up");
    params.resume_session_id = Some("sess-42".to_owned());

    let spec = ClaudePolicy::new().render("claude", &params, None);
    let args = spec.args.join(" ");
    assert!(args.contains("--resume sess-42"));
}

#[test]
fn claude_bridge_wiring_renders_permission_tool() {
    let params = base_params("Hi");
    let bridge = BridgeRef {
        endpoint: "http://127.0.0.1:45678",
        session_label: "pending-abc",
    };
    let spec = ClaudePolicy::new().render("claude", &params, Some(bridge));

    let args = spec.args.join(" ");
    assert!(args.contains("--permission-prompt-tool mcp__warden__approve"));
    assert!(args.contains("--mcp-config"));
    assert!(
        args.contains("http://127.0.0.1:45678"),
        "mcp config must carry the bridge endpoint"
    );
    assert!(
        args.contains("pending-abc"),
        "mcp config must carry the session label"
    );
}

#[test]
fn claude_bypass_suppresses_bridge_wiring() {
    let mut params = base_params("Hi");
    params.bypass_approvals = true;
    let bridge = BridgeRef {
        endpoint: "http://127.0.0.1:45678",
        session_label: "pending-abc",
    };
    let spec = ClaudePolicy::new().render("claude", &params, Some(bridge));

    assert!(spec.args.iter().any(|a| a == "--dangerously-skip-permissions"));
    assert!(
        !spec.args.iter().any(|a| a == "--permission-prompt-tool"),
        "bypass must drop the approval callback wiring"
    );
}

#[test]
fn claude_capabilities() {
    let policy = ClaudePolicy::new();
    assert_eq!(policy.approval_channel(), ApprovalChannel::CallbackBridge);
    assert!(policy.supports_live_stdin());
}

// ── Codex rendering ─────────────────────────────────────────────────────────

#[test]
fn codex_exec_with_prompt_positional_last() {
    let spec = CodexPolicy::new().render("codex", &base_params("Do the thing"), None);

    assert_eq!(spec.program, "codex");
    assert_eq!(spec.args.first().map(String::as_str), Some("exec"));
    assert!(spec.args.iter().any(|a| a == "--json"));
    assert_eq!(
        spec.args.last().map(String::as_str),
        Some("Do the thing"),
        "prompt must be the final positional argument"
    );
    assert!(spec.initial_stdin.is_none());
}

#[test]
fn codex_resume_subcommand_precedes_flags() {
    let mut params = base_params("more work");
    params.resume_session_id = Some("th-7".to_owned());

    let spec = CodexPolicy::new().render("codex", &params, None);
    assert_eq!(&spec.args[..3], ["exec", "resume", "th-7"]);
}

#[test]
fn codex_optional_flags() {
    let mut params = base_params("go");
    params.model = Some("o4-mini".to_owned());
    params.sandbox = Some("workspace-write".to_owned());
    params.skip_git_check = true;
    params.bypass_approvals = true;

    let spec = CodexPolicy::new().render("codex", &params, None);
    let args = spec.args.join(" ");
    assert!(args.contains("--model o4-mini"));
    assert!(args.contains("--sandbox workspace-write"));
    assert!(args.contains("--skip-git-repo-check"));
    assert!(args.contains("--dangerously-bypass-approvals-and-sandbox"));
}

#[test]
fn codex_capabilities() {
    let policy = CodexPolicy::new();
    assert_eq!(policy.approval_channel(), ApprovalChannel::InlineIo);
    assert!(!policy.supports_live_stdin());
    assert!(policy.followup_line("id", "msg").is_none());
}

// ── Shared helpers ──────────────────────────────────────────────────────────

#[test]
fn images_ride_along_in_the_prompt() {
    let prompt = prompt_with_images("look at this", &["shot.png".to_owned()]);
    assert!(prompt.starts_with("look at this"));
    assert!(prompt.contains("[Image: shot.png]"));

    assert_eq!(prompt_with_images("plain", &[]), "plain");
}
