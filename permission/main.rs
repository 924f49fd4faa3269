#![forbid(unsafe_code)]

//! `agent-warden-permission` — auxiliary approval forwarder.
//!
//! Spawned as a child of the agent CLI, which is pointed at it via its
//! permission-prompt wiring. Exposes a single `approve` MCP tool over
//! stdio; each invocation is forwarded as an HTTP POST to the supervisor's
//! loopback `/permission` endpoint and blocks until the operator's
//! (possibly auto-denied) decision comes back.
//!
//! Defined locally rather than against the library crate so the forwarder
//! stays a minimal standalone binary.

use std::future::Future;
use std::sync::Arc;

use clap::Parser;
use rmcp::handler::server::{
    tool::{ToolCallContext, ToolRoute, ToolRouter},
    ServerHandler,
};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ListToolsResult, PaginatedRequestParam, Tool,
};
use rmcp::service::{RequestContext, RoleServer, ServiceExt};
use rmcp::transport::io::stdio;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "agent-warden-permission",
    about = "Approval forwarder for agent-warden",
    version,
    long_about = None
)]
struct Cli {
    /// Base URL of the supervisor's approval bridge.
    #[arg(long, env = "WARDEN_BRIDGE_ENDPOINT")]
    endpoint: String,

    /// Session label stamped on forwarded requests.
    ///
    /// Set by the supervisor at spawn time; `unknown` when absent so the
    /// bridge falls back to its most-recent-session heuristic.
    #[arg(long, env = "WARDEN_SESSION_LABEL", default_value = "unknown")]
    session_label: String,
}

/// Arguments the agent passes to the `approve` tool.
#[derive(Debug, serde::Deserialize)]
struct ApproveInput {
    tool_name: String,
    #[serde(default)]
    input: serde_json::Value,
}

struct PermissionForwarder {
    endpoint: String,
    session_label: String,
    client: reqwest::Client,
}

impl PermissionForwarder {
    fn new(endpoint: String, session_label: String) -> Self {
        Self {
            endpoint,
            session_label,
            // No request timeout: the supervisor always answers, by
            // operator decision or by its own auto-deny timer.
            client: reqwest::Client::new(),
        }
    }

    async fn forward(&self, input: ApproveInput) -> Result<CallToolResult, rmcp::ErrorData> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let body = serde_json::json!({
            "sessionId": self.session_label,
            "toolName": input.tool_name,
            "toolInput": input.input,
            "requestId": request_id,
        });

        info!(request_id, tool = %input.tool_name, "forwarding approval request");

        let response = self
            .client
            .post(format!("{}/permission", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                warn!(%err, "bridge unreachable");
                rmcp::ErrorData::internal_error(format!("bridge unreachable: {err}"), None)
            })?;

        let status = response.status();
        let decision: serde_json::Value = response.json().await.map_err(|err| {
            rmcp::ErrorData::internal_error(format!("invalid bridge response: {err}"), None)
        })?;
        if !status.is_success() {
            return Err(rmcp::ErrorData::internal_error(
                format!("bridge returned {status}: {decision}"),
                None,
            ));
        }

        // The agent reads the decision as the tool result's text content.
        let text = decision.to_string();
        Ok(CallToolResult::success(vec![rmcp::model::Content::text(
            text,
        )]))
    }

    fn tool_router() -> ToolRouter<Self> {
        let mut router = ToolRouter::new();
        router.add_route(ToolRoute::new_dyn(Self::approve_tool(), |context| {
            Box::pin(handle_approve(context))
        }));
        router
    }

    fn approve_tool() -> Tool {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "tool_name": { "type": "string" },
                "input": { "type": "object" }
            },
            "required": ["tool_name", "input"]
        });
        let input_schema = match schema {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::default()),
        };
        Tool {
            name: "approve".into(),
            description: Some(
                "Request operator approval for a tool use. Blocks until a decision \
                 (or timeout auto-deny) arrives."
                    .into(),
            ),
            input_schema,
            annotations: None,
        }
    }
}

/// Handle the `approve` tool call.
async fn handle_approve(
    context: ToolCallContext<'_, PermissionForwarder>,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let args = context.arguments.unwrap_or_default();
    let input: ApproveInput = serde_json::from_value(serde_json::Value::Object(args))
        .map_err(|err| {
            rmcp::ErrorData::invalid_params(format!("invalid approve parameters: {err}"), None)
        })?;
    context.service.forward(input).await
}

impl ServerHandler for PermissionForwarder {
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, rmcp::ErrorData>> + Send + '_ {
        let router = Self::tool_router();

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
        std::future::ready(Ok(ListToolsResult::with_all_items(vec![
            Self::approve_tool(),
        ])))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let forwarder = PermissionForwarder::new(args.endpoint, args.session_label);

    let service = forwarder.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
