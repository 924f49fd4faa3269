//! Shared helpers for tool handlers.

use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;

use crate::AppError;

/// Deserialize the raw tool arguments into a typed input record.
///
/// # Errors
///
/// Returns `rmcp::ErrorData::invalid_params` when the arguments do not
/// match the tool's schema.
pub fn parse_args<T: DeserializeOwned>(
    tool: &str,
    args: Option<serde_json::Map<String, serde_json::Value>>,
) -> Result<T, rmcp::ErrorData> {
    serde_json::from_value(serde_json::Value::Object(args.unwrap_or_default())).map_err(|err| {
        rmcp::ErrorData::invalid_params(format!("invalid {tool} parameters: {err}"), None)
    })
}

/// Wrap a serializable response as a JSON tool result.
///
/// # Errors
///
/// Returns `rmcp::ErrorData::internal_error` when serialization fails.
pub fn json_result(
    value: &impl serde::Serialize,
) -> Result<CallToolResult, rmcp::ErrorData> {
    let value = serde_json::to_value(value).map_err(|err| {
        rmcp::ErrorData::internal_error(format!("failed to serialize response: {err}"), None)
    })?;
    let content = rmcp::model::Content::json(value).map_err(|err| {
        rmcp::ErrorData::internal_error(format!("failed to encode response: {err}"), None)
    })?;
    Ok(CallToolResult::success(vec![content]))
}

/// Map a domain error onto the protocol error space.
///
/// Caller mistakes (bad ids, no pending question, capacity, busy) surface
/// as invalid-params; infrastructure failures as internal errors. The
/// error kind rides along in the message.
#[must_use]
pub fn tool_error(err: &AppError) -> rmcp::ErrorData {
    let message = format!("{err} [{}]", err.kind());
    match err {
        AppError::UnknownSession(_)
        | AppError::NoPendingQuestion(_)
        | AppError::QuestionIdMismatch(_)
        | AppError::NoActiveProcess(_)
        | AppError::CapacityExceeded(_)
        | AppError::Busy(_) => rmcp::ErrorData::invalid_params(message, None),
        _ => rmcp::ErrorData::internal_error(message, None),
    }
}
