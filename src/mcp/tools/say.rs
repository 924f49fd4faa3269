//! `say` tool handler: deliver a follow-up message to a session.

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use tracing::{info_span, Instrument};

use crate::mcp::handler::WardenServer;
use crate::mcp::tools::util::{json_result, parse_args, tool_error};
use crate::models::session::PermissionMode;
use crate::orchestrator::manager::SayOverrides;

/// Input parameters for the `say` tool.
#[derive(Debug, serde::Deserialize)]
struct SayInput {
    session_id: String,
    message: String,
    #[serde(default)]
    images: Vec<String>,
    /// Approval-policy override; forces a process restart when set.
    permission_mode: Option<PermissionMode>,
}

/// Handle the `say` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` on invalid parameters or when the session is
/// busy, over capacity, or fails to respawn.
pub async fn handle(
    context: ToolCallContext<'_, WardenServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let manager = context.service.manager();
    let input: SayInput = parse_args("say", context.arguments)?;

    let span = info_span!("tool_say", session_id = %input.session_id);
    async move {
        let overrides = SayOverrides {
            permission_mode: input.permission_mode,
            images: input.images,
        };
        let outcome = manager
            .say(&input.session_id, &input.message, overrides)
            .await
            .map_err(|e| tool_error(&e))?;
        json_result(&outcome)
    }
    .instrument(span)
    .await
}
