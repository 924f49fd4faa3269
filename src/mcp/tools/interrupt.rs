//! `interrupt` tool handler: SIGINT a running session.

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use tracing::{info_span, Instrument};

use crate::mcp::handler::WardenServer;
use crate::mcp::tools::util::{json_result, parse_args, tool_error};

/// Input parameters for the `interrupt` tool.
#[derive(Debug, serde::Deserialize)]
struct InterruptInput {
    session_id: String,
}

/// Handle the `interrupt` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` on invalid parameters, an unknown session,
/// or when no process is live.
pub async fn handle(
    context: ToolCallContext<'_, WardenServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let manager = context.service.manager();
    let input: InterruptInput = parse_args("interrupt", context.arguments)?;

    let span = info_span!("tool_interrupt", session_id = %input.session_id);
    async move {
        let outcome = manager
            .interrupt(&input.session_id)
            .await
            .map_err(|e| tool_error(&e))?;
        json_result(&outcome)
    }
    .instrument(span)
    .await
}
