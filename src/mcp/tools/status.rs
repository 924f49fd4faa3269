//! `status` tool handler: snapshot one session.

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use tracing::{info_span, Instrument};

use crate::mcp::handler::WardenServer;
use crate::mcp::tools::util::{json_result, parse_args, tool_error};

/// Input parameters for the `status` tool.
#[derive(Debug, serde::Deserialize)]
struct StatusInput {
    session_id: String,
    output_lines: Option<usize>,
}

/// Handle the `status` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` on invalid parameters or an unknown session.
pub async fn handle(
    context: ToolCallContext<'_, WardenServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let manager = context.service.manager();
    let input: StatusInput = parse_args("status", context.arguments)?;

    let span = info_span!("tool_status", session_id = %input.session_id);
    async move {
        let view = manager
            .status(&input.session_id, input.output_lines)
            .await
            .map_err(|e| tool_error(&e))?;
        json_result(&view)
    }
    .instrument(span)
    .await
}
