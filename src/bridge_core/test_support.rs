//! In-memory doubles for orchestrator and router tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::orchestrator::ReplySink;
use crate::naga_api::{ChatClient, ChatReply, ClientError, SystemClient, SystemInfo, ToolResult};

/// A recorded `chat` call: `(message, session_id)`.
pub type ChatCall = (String, Option<String>);

/// A recorded `invoke_tool` call: `(service_name, params, session_id)`.
pub type ToolCall = (String, Map<String, Value>, Option<String>);

/// A `ChatClient` that replays scripted replies and records every call.
pub struct ScriptedClient {
    healthy: bool,
    chat_replies: Mutex<VecDeque<Result<ChatReply, ClientError>>>,
    tool_replies: Mutex<VecDeque<Result<ToolResult, ClientError>>>,
    /// Returned once `chat_replies` runs out.
    repeat_chat: Option<ChatReply>,
    devmode_error: Option<String>,
    info: Map<String, Value>,
    chat_calls: Mutex<Vec<ChatCall>>,
    tool_calls: Mutex<Vec<ToolCall>>,
    devmode_calls: Mutex<Vec<bool>>,
    health_calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            healthy: true,
            chat_replies: Mutex::new(VecDeque::new()),
            tool_replies: Mutex::new(VecDeque::new()),
            repeat_chat: None,
            devmode_error: None,
            info: Map::new(),
            chat_calls: Mutex::new(Vec::new()),
            tool_calls: Mutex::new(Vec::new()),
            devmode_calls: Mutex::new(Vec::new()),
            health_calls: AtomicUsize::new(0),
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Queue a successful chat reply.
    pub fn reply(self, text: &str, session_id: Option<&str>) -> Self {
        self.chat_replies.lock().unwrap().push_back(Ok(ChatReply {
            text: text.to_string(),
            session_id: session_id.map(String::from),
        }));
        self
    }

    pub fn chat_error(self, error: ClientError) -> Self {
        self.chat_replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// Reply with this text forever once the queue is empty.
    pub fn always_reply(mut self, text: &str) -> Self {
        self.repeat_chat = Some(ChatReply {
            text: text.to_string(),
            session_id: None,
        });
        self
    }

    pub fn tool_result(self, payload: Value) -> Self {
        self.tool_replies
            .lock()
            .unwrap()
            .push_back(Ok(ToolResult { payload }));
        self
    }

    pub fn tool_error(self, error: ClientError) -> Self {
        self.tool_replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn devmode_fails(mut self, message: &str) -> Self {
        self.devmode_error = Some(message.to_string());
        self
    }

    pub fn system_entry(mut self, key: &str, value: Value) -> Self {
        self.info.insert(key.to_string(), value);
        self
    }

    pub fn chat_calls(&self) -> Vec<ChatCall> {
        self.chat_calls.lock().unwrap().clone()
    }

    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.tool_calls.lock().unwrap().clone()
    }

    pub fn devmode_calls(&self) -> Vec<bool> {
        self.devmode_calls.lock().unwrap().clone()
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn health_check(&self) -> bool {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        self.healthy
    }

    async fn chat(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, ClientError> {
        self.chat_calls
            .lock()
            .unwrap()
            .push((message.to_string(), session_id.map(String::from)));

        let next = self.chat_replies.lock().unwrap().pop_front();
        match (next, &self.repeat_chat) {
            (Some(reply), _) => reply,
            (None, Some(repeat)) => Ok(repeat.clone()),
            (None, None) => Err(ClientError::MalformedResponse {
                reason: "chat script exhausted".into(),
            }),
        }
    }

    async fn invoke_tool(
        &self,
        service_name: &str,
        params: &Map<String, Value>,
        session_id: Option<&str>,
    ) -> Result<ToolResult, ClientError> {
        self.tool_calls.lock().unwrap().push((
            service_name.to_string(),
            params.clone(),
            session_id.map(String::from),
        ));

        let next = self.tool_replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(ToolResult {
                payload: json!({ "status": "success", "result": "ok" }),
            })
        })
    }
}

#[async_trait]
impl SystemClient for ScriptedClient {
    async fn toggle_developer_mode(&self, enabled: bool) -> Result<(), ClientError> {
        self.devmode_calls.lock().unwrap().push(enabled);
        match &self.devmode_error {
            Some(message) => Err(ClientError::RemoteStatus {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn system_info(&self) -> Result<SystemInfo, ClientError> {
        Ok(SystemInfo {
            entries: self.info.clone(),
        })
    }
}

/// A `ReplySink` that keeps every message it is sent.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send(&self, text: &str) {
        self.sent.lock().unwrap().push(text.to_string());
    }
}
