//! `start` tool handler: launch a new agent session.

use std::path::PathBuf;

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use tracing::{info_span, Instrument};

use crate::mcp::handler::WardenServer;
use crate::mcp::tools::util::{json_result, parse_args, tool_error};
use crate::models::session::{PermissionMode, SpawnParams};

/// Input parameters for the `start` tool.
#[derive(Debug, serde::Deserialize)]
struct StartInput {
    prompt: String,
    working_directory: Option<PathBuf>,
    model: Option<String>,
    permission_mode: Option<PermissionMode>,
    sandbox: Option<String>,
    #[serde(default)]
    allowed_tools: Vec<String>,
    #[serde(default)]
    disallowed_tools: Vec<String>,
    max_turns: Option<u32>,
    max_budget: Option<f64>,
    system_prompt: Option<String>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    skip_git_check: bool,
    #[serde(default)]
    bypass_approvals: bool,
}

/// Handle the `start` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` on invalid parameters, capacity exhaustion,
/// or spawn failure.
pub async fn handle(
    context: ToolCallContext<'_, WardenServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let manager = context.service.manager();
    let input: StartInput = parse_args("start", context.arguments)?;

    let span = info_span!("tool_start");
    async move {
        let params = SpawnParams {
            prompt: input.prompt,
            working_directory: input.working_directory,
            model: input.model,
            permission_mode: input.permission_mode,
            sandbox: input.sandbox,
            allowed_tools: input.allowed_tools,
            disallowed_tools: input.disallowed_tools,
            max_turns: input.max_turns,
            max_budget: input.max_budget,
            system_prompt: input.system_prompt,
            images: input.images,
            skip_git_check: input.skip_git_check,
            bypass_approvals: input.bypass_approvals,
            resume_session_id: None,
        };

        let outcome = manager.start(params).await.map_err(|e| tool_error(&e))?;
        json_result(&outcome)
    }
    .instrument(span)
    .await
}
