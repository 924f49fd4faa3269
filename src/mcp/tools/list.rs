//! `list` tool handler: discover sessions on disk and in memory.

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use tracing::{info_span, Instrument};

use crate::mcp::handler::WardenServer;
use crate::mcp::tools::util::{json_result, parse_args, tool_error};

/// Input parameters for the `list` tool.
#[derive(Debug, serde::Deserialize)]
struct ListInput {
    working_directory: Option<String>,
    limit: Option<usize>,
}

/// Response wrapper for the `list` tool.
#[derive(Debug, serde::Serialize)]
struct ListOutput {
    sessions: Vec<crate::orchestrator::manager::SessionListEntry>,
}

/// Handle the `list` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` on invalid parameters.
pub async fn handle(
    context: ToolCallContext<'_, WardenServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let manager = context.service.manager();
    let input: ListInput = parse_args("list", context.arguments)?;

    let span = info_span!("tool_list");
    async move {
        let sessions = manager
            .list(input.working_directory.as_deref(), input.limit)
            .await
            .map_err(|e| tool_error(&e))?;
        json_result(&ListOutput { sessions })
    }
    .instrument(span)
    .await
}
