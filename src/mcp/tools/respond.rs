//! `respond` tool handler: answer a pending question.

use rmcp::handler::server::tool::ToolCallContext;
use rmcp::model::CallToolResult;
use tracing::{info_span, Instrument};

use crate::mcp::handler::WardenServer;
use crate::mcp::tools::util::{json_result, parse_args, tool_error};

/// Input parameters for the `respond` tool.
#[derive(Debug, serde::Deserialize)]
struct RespondInput {
    session_id: String,
    question_id: String,
    answers: Vec<String>,
}

/// Handle the `respond` tool call.
///
/// # Errors
///
/// Returns `rmcp::ErrorData` on invalid parameters, an unknown session,
/// a missing pending question, or a question-id mismatch.
pub async fn handle(
    context: ToolCallContext<'_, WardenServer>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let manager = context.service.manager();
    let input: RespondInput = parse_args("respond", context.arguments)?;

    let span = info_span!(
        "tool_respond",
        session_id = %input.session_id,
        question_id = %input.question_id,
    );
    async move {
        let outcome = manager
            .respond(&input.session_id, &input.question_id, &input.answers)
            .await
            .map_err(|e| tool_error(&e))?;
        json_result(&outcome)
    }
    .instrument(span)
    .await
}
