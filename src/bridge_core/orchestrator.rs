//! Conversation orchestrator: one user message in, one terminal outcome out.
//!
//! A turn moves through these states:
//! 1. **Resolve session**: pick (or create) the user's active session and
//!    make sure it has an id.
//! 2. **Chat**: send the message; adopt and persist the session id the
//!    server returns.
//! 3. **Inspect**: look for a tool directive in the reply. None ends the turn.
//! 4. **Tool loop** (bounded by `max_handoff_loop`): invoke the tool, send
//!    its result back as a follow-up chat, re-inspect the new reply. Reaching
//!    the bound ends the turn with the last reply, not an error.
//!
//! Remote failures end the turn immediately and are never retried.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::errors::TurnError;
use super::session_store::SessionStore;
use super::types::TurnOutcome;
use crate::naga_api::{parse_directive, ChatClient, ChatReply};

/// Outbound side of the chat surface.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, text: &str);
}

/// Tool-loop settings taken from the bridge config.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Max tool-call → follow-up exchanges per turn.
    pub max_handoff_loop: u32,
    /// Send intermediate replies to the sink while the loop continues.
    pub show_handoff: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_handoff_loop: 5,
            show_handoff: false,
        }
    }
}

pub struct Orchestrator {
    client: Arc<dyn ChatClient>,
    store: Arc<SessionStore>,
    settings: LoopSettings,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn ChatClient>, store: Arc<SessionStore>, settings: LoopSettings) -> Self {
        Self {
            client,
            store,
            settings,
        }
    }

    /// Run one conversation turn for `user_id`.
    ///
    /// Interim replies (when enabled) go to `sink` as they arrive. The final
    /// reply or error is returned; the caller delivers it.
    pub async fn run_turn(&self, user_id: &str, message: &str, sink: &dyn ReplySink) -> TurnOutcome {
        match self.drive(user_id, message, sink).await {
            Ok(text) => {
                tracing::debug!(user_id, reply_len = text.len(), "turn complete");
                TurnOutcome::Reply(text)
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "turn failed");
                TurnOutcome::Failed(e)
            }
        }
    }

    async fn drive(&self, user_id: &str, message: &str, sink: &dyn ReplySink) -> Result<String, TurnError> {
        let resolved = self.store.resolve_for_turn(user_id)?;
        let session_name = resolved.name;
        let mut session_id = resolved.id;

        tracing::info!(
            user_id,
            session = %session_name,
            session_id = %session_id,
            created = resolved.created,
            message_len = message.len(),
            "turn started"
        );

        let reply = self.client.chat(message, Some(session_id.as_str())).await?;
        self.adopt_session_id(user_id, &session_name, &mut session_id, &reply);

        if reply.text.trim().is_empty() {
            tracing::warn!(user_id, "remote returned an empty reply");
            return Err(TurnError::EmptyReply);
        }

        let mut text = reply.text;
        let Some(mut directive) = parse_directive(&text) else {
            return Ok(text);
        };

        let bound = self.settings.max_handoff_loop;
        for iteration in 1..=bound {
            tracing::info!(
                user_id,
                iteration,
                service = %directive.service_name,
                "tool handoff"
            );

            let result = self
                .client
                .invoke_tool(&directive.service_name, &directive.params, Some(session_id.as_str()))
                .await?;

            let followup = followup_message(&directive.service_name, &result.payload);
            tracing::debug!(user_id, followup_len = followup.len(), "sending tool result");

            let reply = self.client.chat(&followup, Some(session_id.as_str())).await?;
            self.adopt_session_id(user_id, &session_name, &mut session_id, &reply);
            text = reply.text;

            match parse_directive(&text) {
                Some(next) => directive = next,
                None => {
                    tracing::info!(user_id, iterations = iteration, "tool loop finished");
                    return non_empty(text);
                }
            }

            if self.settings.show_handoff && iteration < bound {
                sink.send(&format!("Interim result: {text}")).await;
            }
        }

        tracing::info!(user_id, bound, "tool loop bound reached");
        non_empty(text)
    }

    /// Prefer the server-assigned id and persist it.
    ///
    /// A session deleted by a concurrent admin command is not an error for
    /// the turn in flight; the id simply has nowhere to go.
    fn adopt_session_id(&self, user_id: &str, name: &str, current: &mut String, reply: &ChatReply) {
        if let Some(server_id) = &reply.session_id {
            if *server_id != *current {
                tracing::debug!(user_id, from = %current, to = %server_id, "adopting server session id");
                *current = server_id.clone();
            }
        }

        if let Err(e) = self.store.update_id(user_id, name, current) {
            tracing::warn!(user_id, session = name, error = %e, "could not persist session id");
        }
    }
}

/// The chat message that hands a tool result back to the model.
fn followup_message(service_name: &str, payload: &Value) -> String {
    format!("Tool {service_name} result: {payload}")
}

fn non_empty(text: String) -> Result<String, TurnError> {
    if text.trim().is_empty() {
        Err(TurnError::EmptyReply)
    } else {
        Ok(text)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
