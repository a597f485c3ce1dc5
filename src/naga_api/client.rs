//! NagaAgent HTTP client.
//!
//! Implements the [`ChatClient`] capability the orchestrator consumes, plus
//! the system endpoints (dev mode, system info) used by chat commands. Every
//! failure is converted to a [`ClientError`] at this boundary.

use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client as HttpClient;
use serde_json::{Map, Value};

use super::config::BridgeConfig;
use super::errors::ClientError;
use super::streaming::{collect_text, parse_data_stream};
use super::types::{
    check_status_object, ChatReply, ChatRequest, ChatResponseBody, DevModeRequest,
    HandoffRequest, HandoffTask, SystemInfo, ToolResult,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request timeout for non-streaming calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Total request timeout for streaming calls.
const STREAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

// ─── Capability ──────────────────────────────────────────────────────────────

/// The remote conversational capability the orchestrator drives.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Whether the service answers its health endpoint.
    async fn health_check(&self) -> bool;

    /// Send one chat message, optionally within an existing session.
    async fn chat(&self, message: &str, session_id: Option<&str>)
        -> Result<ChatReply, ClientError>;

    /// Invoke a named tool service with the directive's parameters.
    async fn invoke_tool(
        &self,
        service_name: &str,
        params: &Map<String, Value>,
        session_id: Option<&str>,
    ) -> Result<ToolResult, ClientError>;
}

/// Server administration endpoints used by chat commands.
#[async_trait]
pub trait SystemClient: Send + Sync {
    /// Toggle developer mode on the NagaAgent server.
    async fn toggle_developer_mode(&self, enabled: bool) -> Result<(), ClientError>;

    /// Fetch the server's system information.
    async fn system_info(&self) -> Result<SystemInfo, ClientError>;
}

// ─── NagaClient ──────────────────────────────────────────────────────────────

/// HTTP client for the NagaAgent API.
pub struct NagaClient {
    /// HTTP client for regular requests (30s timeout).
    http: HttpClient,
    /// HTTP client for streaming requests (180s timeout).
    http_stream: HttpClient,
    /// `http://host:port`, no trailing slash.
    base_url: String,
    /// Route `chat` through the streaming endpoint.
    use_streaming: bool,
}

impl NagaClient {
    /// Build a client from the bridge configuration.
    ///
    /// Does NOT check connectivity; that happens through the health gate on
    /// first use.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ClientError> {
        Self::new(config.base_url(), config.use_streaming)
    }

    pub fn new(base_url: impl Into<String>, use_streaming: bool) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::ConnectionFailed {
                endpoint: base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let http_stream = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(STREAM_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::ConnectionFailed {
                endpoint: base_url.clone(),
                reason: format!("failed to build streaming HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            http_stream,
            base_url,
            use_streaming,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    // ─── Chat ────────────────────────────────────────────────────────────

    async fn chat_once(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, ClientError> {
        let url = self.url("/chat");
        let body = ChatRequest {
            message: message.to_string(),
            session_id: session_id.map(String::from),
            stream: false,
        };

        tracing::debug!(
            url = %url,
            session_id = ?session_id,
            message_len = message.len(),
            "chat request"
        );

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(&url, e, REQUEST_TIMEOUT))?;

        let text = success_body(response).await?;
        let parsed: ChatResponseBody =
            serde_json::from_str(&text).map_err(|e| ClientError::MalformedResponse {
                reason: format!("chat response is not valid JSON: {e}"),
            })?;
        parsed.into_reply()
    }

    /// Send a streaming chat request; yields the `data: ` fragments.
    pub async fn chat_stream(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<impl Stream<Item = Result<String, ClientError>>, ClientError> {
        let url = self.url("/chat/stream");
        let body = ChatRequest {
            message: message.to_string(),
            session_id: session_id.map(String::from),
            stream: true,
        };

        tracing::debug!(url = %url, session_id = ?session_id, "streaming chat request");

        let response = self
            .http_stream
            .post(&url)
            .json(&body)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| request_error(&url, e, STREAM_REQUEST_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ClientError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        Ok(parse_data_stream(response))
    }
}

#[async_trait]
impl ChatClient for NagaClient {
    async fn health_check(&self) -> bool {
        let url = self.url("/health");
        match self.http.get(&url).timeout(CONNECT_TIMEOUT).send().await {
            Ok(resp) => {
                let healthy = resp.status() == reqwest::StatusCode::OK;
                tracing::debug!(healthy, "health check");
                healthy
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "health check failed");
                false
            }
        }
    }

    async fn chat(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, ClientError> {
        if !self.use_streaming {
            return self.chat_once(message, session_id).await;
        }

        // The stream carries only text, so the caller keeps its own session id.
        let fragments = self.chat_stream(message, session_id).await?;
        let text = collect_text(fragments).await?;
        Ok(ChatReply {
            text,
            session_id: None,
        })
    }

    async fn invoke_tool(
        &self,
        service_name: &str,
        params: &Map<String, Value>,
        session_id: Option<&str>,
    ) -> Result<ToolResult, ClientError> {
        let url = self.url("/mcp/handoff");
        let body = HandoffRequest {
            service_name: service_name.to_string(),
            task: HandoffTask::execute(params.clone()),
            session_id: session_id.map(String::from),
        };

        tracing::debug!(
            url = %url,
            service = service_name,
            session_id = ?session_id,
            "handoff request"
        );

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(&url, e, REQUEST_TIMEOUT))?;

        let value = json_body(response).await?;
        let object = check_status_object(value)?;
        Ok(ToolResult {
            payload: Value::Object(object),
        })
    }
}

#[async_trait]
impl SystemClient for NagaClient {
    async fn toggle_developer_mode(&self, enabled: bool) -> Result<(), ClientError> {
        let url = self.url("/system/devmode");
        let response = self
            .http
            .post(&url)
            .json(&DevModeRequest { enabled })
            .send()
            .await
            .map_err(|e| request_error(&url, e, REQUEST_TIMEOUT))?;

        let value = json_body(response).await?;
        check_status_object(value)?;
        tracing::info!(enabled, "developer mode toggled");
        Ok(())
    }

    async fn system_info(&self) -> Result<SystemInfo, ClientError> {
        let url = self.url("/system/info");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(&url, e, REQUEST_TIMEOUT))?;

        let value = json_body(response).await?;
        let entries = check_status_object(value)?;
        Ok(SystemInfo { entries })
    }
}

// ─── Response helpers ────────────────────────────────────────────────────────

/// Classify a transport-level `reqwest` failure.
fn request_error(url: &str, e: reqwest::Error, timeout: Duration) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout {
            duration_secs: timeout.as_secs(),
        }
    } else {
        ClientError::ConnectionFailed {
            endpoint: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Return the body text of a 2xx response, or an `HttpError`.
async fn success_body(response: reqwest::Response) -> Result<String, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(ClientError::HttpError {
            status: status.as_u16(),
            body: body_text,
        });
    }

    response.text().await.map_err(|e| ClientError::StreamError {
        reason: format!("failed to read response body: {e}"),
    })
}

async fn json_body(response: reqwest::Response) -> Result<Value, ClientError> {
    let text = success_body(response).await?;
    serde_json::from_str(&text).map_err(|e| ClientError::MalformedResponse {
        reason: format!("response is not valid JSON: {e}"),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
