//! Approval callback bridge.
//!
//! A single loopback HTTP listener shared by all sessions. The auxiliary
//! permission program spawned under each agent POSTs approval requests to
//! `/permission` and blocks on the response; the supervisor answers with
//! the translated operator decision (or an auto-deny on timeout).
//!
//! Wire shape: request `{sessionId, toolName, toolInput, requestId}`,
//! response `{behavior: "allow"|"deny", message?, updatedInput?}`. Unknown
//! paths return 404, invalid JSON 400, handler failures 500 with a JSON
//! error body.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::orchestrator::manager::SessionManager;
use crate::{AppError, Result};

/// An approval request as posted by the auxiliary permission program.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    /// Session label; may be a temp id or the sentinel `unknown`.
    #[serde(default)]
    pub session_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    pub request_id: String,
}

/// Handle to the running bridge listener.
pub struct BridgeHandle {
    /// Base URL, e.g. `http://127.0.0.1:49321`.
    pub endpoint: String,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    /// Wait for the listener task to finish after cancellation.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Bind the loopback listener on an ephemeral port and start serving.
///
/// # Errors
///
/// Returns `AppError::Bridge` if the listener cannot bind.
pub async fn start(manager: Arc<SessionManager>, ct: CancellationToken) -> Result<BridgeHandle> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|err| AppError::Bridge(format!("failed to bind loopback listener: {err}")))?;
    let addr = listener
        .local_addr()
        .map_err(|err| AppError::Bridge(format!("failed to read local addr: {err}")))?;
    let endpoint = format!("http://{addr}");

    let router = Router::new()
        .route("/permission", post(permission))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(manager);

    info!(%endpoint, "approval bridge listening");

    let task = tokio::spawn(async move {
        let shutdown = async move { ct.cancelled().await };
        if let Err(err) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            warn!(%err, "approval bridge server error");
        }
        info!("approval bridge shut down");
    });

    Ok(BridgeHandle { endpoint, task })
}

async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

/// `POST /permission` handler.
///
/// Blocks until the operator responds, the question times out, or the
/// supervisor shuts down. The agent's approval path is suspended on this
/// response the whole time.
async fn permission(State(manager): State<Arc<SessionManager>>, body: Bytes) -> Response {
    let request: PermissionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("invalid request body: {err}") })),
            )
                .into_response();
        }
    };

    match manager.mediate_approval(request).await {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
