//! Shared types for the NagaAgent API client.
//!
//! Request bodies mirror the NagaAgent HTTP API. Response bodies are parsed
//! leniently (every field optional) and then validated into the typed
//! results the orchestrator consumes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::ClientError;

// ─── Request Types ───────────────────────────────────────────────────────────

/// Request body for `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub stream: bool,
}

/// Request body for `POST /mcp/handoff`.
#[derive(Debug, Clone, Serialize)]
pub struct HandoffRequest {
    pub service_name: String,
    pub task: HandoffTask,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// The `task` mapping of a handoff request.
#[derive(Debug, Clone, Serialize)]
pub struct HandoffTask {
    /// Always `"execute"` for directive-driven calls.
    pub action: String,
    pub params: Map<String, Value>,
}

impl HandoffTask {
    pub fn execute(params: Map<String, Value>) -> Self {
        Self {
            action: "execute".to_string(),
            params,
        }
    }
}

/// Request body for `POST /system/devmode`.
#[derive(Debug, Clone, Serialize)]
pub struct DevModeRequest {
    pub enabled: bool,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// The `status` field reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
    #[serde(other)]
    Unknown,
}

/// Raw response body of `POST /chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponseBody {
    #[serde(default)]
    pub status: Option<ReplyStatus>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Error description when `status` is `"error"`.
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatResponseBody {
    /// Validate the raw body into a [`ChatReply`].
    ///
    /// An `"error"` status becomes [`ClientError::RemoteStatus`]; a missing or
    /// unrecognized status is a malformed response. A blank `session_id` is
    /// treated as absent.
    pub fn into_reply(self) -> Result<ChatReply, ClientError> {
        match self.status {
            Some(ReplyStatus::Success) => Ok(ChatReply {
                text: self.response.unwrap_or_default(),
                session_id: self.session_id.filter(|id| !id.trim().is_empty()),
            }),
            Some(ReplyStatus::Error) => Err(ClientError::RemoteStatus {
                message: self
                    .message
                    .unwrap_or_else(|| "API call failed".to_string()),
            }),
            Some(ReplyStatus::Unknown) | None => Err(ClientError::MalformedResponse {
                reason: "chat response has no recognizable status".to_string(),
            }),
        }
    }
}

/// A successful chat exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// The AI's reply text (may be empty).
    pub text: String,
    /// Server-assigned session identifier, if the server returned one.
    pub session_id: Option<String>,
}

/// A successful tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// The full response object, forwarded verbatim to the follow-up chat.
    pub payload: Value,
}

/// Key → value mapping returned by `GET /system/info`.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemInfo {
    pub entries: Map<String, Value>,
}

impl SystemInfo {
    /// Render as `key: value` lines under a header.
    pub fn render(&self) -> String {
        let mut text = String::from("System info:");
        for (key, value) in &self.entries {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            text.push_str(&format!("\n  {key}: {shown}"));
        }
        text
    }
}

/// Reject a JSON body whose `status` is `"error"`, otherwise return it as an object.
///
/// Shared by the handoff, devmode, and system-info endpoints, which all
/// return free-form objects with an optional `status`/`message` pair.
pub fn check_status_object(body: Value) -> Result<Map<String, Value>, ClientError> {
    let obj = match body {
        Value::Object(obj) => obj,
        other => {
            return Err(ClientError::MalformedResponse {
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            })
        }
    };

    if obj.get("status").and_then(Value::as_str) == Some("error") {
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(ClientError::RemoteStatus { message });
    }

    Ok(obj)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A tool-invocation request parsed out of an AI reply.
///
/// Transient: produced by the directive parser and consumed by the
/// orchestrator within one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDirective {
    pub service_name: String,
    pub params: Map<String, Value>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
