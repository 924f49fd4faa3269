//! MCP server handler and tool router.

use std::future::Future;
use std::sync::Arc;

use rmcp::handler::server::{
    tool::{ToolCallContext, ToolRoute, ToolRouter},
    ServerHandler,
};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use tracing::info_span;

use crate::orchestrator::manager::SessionManager;

/// MCP server implementation exposing the six supervisor tools.
pub struct WardenServer {
    manager: Arc<SessionManager>,
}

impl WardenServer {
    /// Create a new MCP server bound to the session manager.
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Access the shared session manager.
    #[must_use]
    pub fn manager(&self) -> Arc<SessionManager> {
        Arc::clone(&self.manager)
    }

    fn tool_router() -> ToolRouter<Self> {
        let mut router = ToolRouter::new();

        for tool in Self::all_tools() {
            let name = tool.name.to_string();
            match name.as_str() {
                "start" => {
                    router.add_route(ToolRoute::new_dyn(tool, |context| {
                        Box::pin(crate::mcp::tools::start::handle(context))
                    }));
                }
                "say" => {
                    router.add_route(ToolRoute::new_dyn(tool, |context| {
                        Box::pin(crate::mcp::tools::say::handle(context))
                    }));
                }
                "status" => {
                    router.add_route(ToolRoute::new_dyn(tool, |context| {
                        Box::pin(crate::mcp::tools::status::handle(context))
                    }));
                }
                "respond" => {
                    router.add_route(ToolRoute::new_dyn(tool, |context| {
                        Box::pin(crate::mcp::tools::respond::handle(context))
                    }));
                }
                "interrupt" => {
                    router.add_route(ToolRoute::new_dyn(tool, |context| {
                        Box::pin(crate::mcp::tools::interrupt::handle(context))
                    }));
                }
                "list" => {
                    router.add_route(ToolRoute::new_dyn(tool, |context| {
                        Box::pin(crate::mcp::tools::list::handle(context))
                    }));
                }
                _ => {
                    router.add_route(ToolRoute::new_dyn(tool, |_context| {
                        Box::pin(async {
                            Err(rmcp::ErrorData::internal_error("tool not implemented", None))
                        })
                    }));
                }
            }
        }

        router
    }

    /// Convert a `serde_json::Value::Object` into the `Arc<Map>` expected by `Tool`.
    fn schema(value: serde_json::Value) -> Arc<serde_json::Map<String, serde_json::Value>> {
        match value {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::default()),
        }
    }

    #[allow(clippy::too_many_lines)] // Tool definitions are intentionally verbose for clarity.
    fn all_tools() -> Vec<Tool> {
        vec![
            Tool {
                name: "start".into(),
                description: Some(
                    "Start a new agent session with the given prompt. Returns the \
                     session id (agent-assigned when it arrives in time) and status."
                        .into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "prompt": { "type": "string" },
                        "working_directory": { "type": "string" },
                        "model": { "type": "string" },
                        "permission_mode": { "type": "string", "enum": ["default", "accept_edits", "plan", "bypass_permissions"] },
                        "sandbox": { "type": "string" },
                        "allowed_tools": { "type": "array", "items": { "type": "string" } },
                        "disallowed_tools": { "type": "array", "items": { "type": "string" } },
                        "max_turns": { "type": "integer", "minimum": 1 },
                        "max_budget": { "type": "number" },
                        "system_prompt": { "type": "string" },
                        "images": { "type": "array", "items": { "type": "string" } },
                        "skip_git_check": { "type": "boolean", "default": false },
                        "bypass_approvals": { "type": "boolean", "default": false }
                    },
                    "required": ["prompt"]
                })),
                annotations: None,
            },
            Tool {
                name: "say".into(),
                description: Some(
                    "Send a follow-up message to an existing session, resuming it \
                     into a fresh process when it is no longer running."
                        .into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "session_id": { "type": "string" },
                        "message": { "type": "string" },
                        "images": { "type": "array", "items": { "type": "string" } },
                        "permission_mode": { "type": "string", "enum": ["default", "accept_edits", "plan", "bypass_permissions"] }
                    },
                    "required": ["session_id", "message"]
                })),
                annotations: None,
            },
            Tool {
                name: "status".into(),
                description: Some(
                    "Snapshot a session: status, recent output, tool uses, pending \
                     question, metrics."
                        .into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "session_id": { "type": "string" },
                        "output_lines": { "type": "integer", "minimum": 1, "default": 50 }
                    },
                    "required": ["session_id"]
                })),
                annotations: None,
            },
            Tool {
                name: "respond".into(),
                description: Some(
                    "Answer the pending question of a session blocked awaiting \
                     input. Each answer may carry a reason after a colon, e.g. \
                     'deny: touches generated code'."
                        .into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "session_id": { "type": "string" },
                        "question_id": { "type": "string" },
                        "answers": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["session_id", "question_id", "answers"]
                })),
                annotations: None,
            },
            Tool {
                name: "interrupt".into(),
                description: Some("Interrupt a session's running agent process (SIGINT).".into()),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "session_id": { "type": "string" }
                    },
                    "required": ["session_id"]
                })),
                annotations: None,
            },
            Tool {
                name: "list".into(),
                description: Some(
                    "List known sessions from the agent's on-disk index merged with \
                     live supervisor sessions, newest first."
                        .into(),
                ),
                input_schema: Self::schema(serde_json::json!({
                    "type": "object",
                    "properties": {
                        "working_directory": { "type": "string" },
                        "limit": { "type": "integer", "minimum": 1, "default": 50 }
                    }
                })),
                annotations: None,
            },
        ]
    }
}

impl ServerHandler for WardenServer {
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, rmcp::ErrorData>> + Send + '_ {
        let router = Self::tool_router();
        let _span = info_span!("call_tool", tool = %request.name).entered();

        async move {
            router
                .call(ToolCallContext::new(self, request, context))
                .await
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, rmcp::ErrorData>> + Send + '_ {
        let tools = Self::all_tools();

        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }
}
