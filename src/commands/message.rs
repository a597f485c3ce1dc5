//! Inbound message router.
//!
//! Every chat message from the platform lands in [`Bridge::handle_message`]
//! as a `(user_id, text)` pair. Messages without an activation prefix are
//! ignored. The rest are routed, in order, to:
//!
//! 1. usage text (prefix with nothing after it)
//! 2. `activate <prefix>`
//! 3. `session …` admin commands
//! 4. the health gate (first use only)
//! 5. `devmode on|off` / `sysinfo`
//! 6. a conversation turn

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use super::{prefix, session, system};
use crate::bridge_core::{
    HealthGate, LoopSettings, Orchestrator, PrefixRegistry, ReplySink, SessionStore, TurnError,
    TurnOutcome,
};
use crate::naga_api::{BridgeConfig, ChatClient, SystemClient};

/// Shared state behind every inbound message.
pub struct Bridge {
    store: Arc<SessionStore>,
    prefixes: PrefixRegistry,
    health: HealthGate,
    client: Arc<dyn ChatClient>,
    system: Arc<dyn SystemClient>,
    orchestrator: Orchestrator,
}

impl Bridge {
    pub fn new(
        config: &BridgeConfig,
        client: Arc<dyn ChatClient>,
        system: Arc<dyn SystemClient>,
        store: Arc<SessionStore>,
    ) -> Self {
        let settings = LoopSettings {
            max_handoff_loop: config.max_handoff_loop,
            show_handoff: config.show_handoff,
        };
        let orchestrator = Orchestrator::new(Arc::clone(&client), Arc::clone(&store), settings);

        Self {
            store,
            prefixes: PrefixRegistry::new(config.default_prefix.clone()),
            health: HealthGate::new(),
            client,
            system,
            orchestrator,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Handle one inbound message.
    ///
    /// Returns `None` when the message is not addressed to the bridge.
    /// Otherwise the outcome's text has already been sent to `sink`.
    pub async fn handle_message(
        &self,
        user_id: &str,
        text: &str,
        sink: &dyn ReplySink,
    ) -> Option<TurnOutcome> {
        let body = self.prefixes.strip(user_id, text)?;

        let span = tracing::info_span!("message", turn_id = %Uuid::new_v4(), user_id);
        let outcome = async {
            tracing::info!(body_len = body.len(), "bridge activated");
            self.route(user_id, &body, sink).await
        }
        .instrument(span)
        .await;

        sink.send(&outcome.text()).await;
        Some(outcome)
    }

    async fn route(&self, user_id: &str, body: &str, sink: &dyn ReplySink) -> TurnOutcome {
        if body.is_empty() {
            return TurnOutcome::Reply(usage_text(self.prefixes.default_prefix()));
        }

        if let Some(args) = keyword_args(body, "activate") {
            return prefix::activate(&self.prefixes, user_id, args);
        }

        if let Some(args) = keyword_args(body, "session") {
            return session::handle_session_command(&self.store, user_id, args);
        }

        if !self.health.is_healthy(self.client.as_ref()).await {
            return TurnOutcome::Failed(TurnError::RemoteUnavailable {
                reason: "health check failed".to_string(),
            });
        }

        if let Some(command) = system::parse_system_command(body) {
            return system::execute(self.system.as_ref(), command).await;
        }

        self.orchestrator.run_turn(user_id, body, sink).await
    }
}

/// The arguments after `keyword`, if `body` is that command.
///
/// `keyword` must be the whole first word: `sessions` is not `session`.
fn keyword_args<'a>(body: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = body.strip_prefix(keyword)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn usage_text(prefix: &str) -> String {
    format!(
        "Usage:\n\
         {prefix} <message> - send a message to the AI\n\
         {prefix} activate <prefix> - set a custom activation prefix\n\
         {prefix} session help - manage conversation sessions\n\
         {prefix} devmode on|off - toggle developer mode\n\
         {prefix} sysinfo - show server system info"
    )
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge_core::test_support::{RecordingSink, ScriptedClient};

    const USER: &str = "console:alice";

    fn bridge(client: &Arc<ScriptedClient>) -> Bridge {
        let chat: Arc<dyn ChatClient> = client.clone();
        let system: Arc<dyn SystemClient> = client.clone();
        Bridge::new(
            &BridgeConfig::default(),
            chat,
            system,
            Arc::new(SessionStore::new()),
        )
    }

    #[tokio::test]
    async fn test_unprefixed_message_ignored() {
        let client = Arc::new(ScriptedClient::new());
        let bridge = bridge(&client);
        let sink = RecordingSink::new();

        assert!(bridge.handle_message(USER, "hello there", &sink).await.is_none());
        assert!(sink.sent().is_empty());
        assert_eq!(client.health_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_body_shows_usage() {
        let client = Arc::new(ScriptedClient::new());
        let bridge = bridge(&client);
        let sink = RecordingSink::new();

        let out = bridge.handle_message(USER, "  #naga  ", &sink).await.unwrap();
        assert!(out.text().starts_with("Usage:\n#naga <message>"));
        assert_eq!(sink.sent(), vec![out.text()]);
    }

    #[tokio::test]
    async fn test_conversation_turn() {
        let client = Arc::new(ScriptedClient::new().reply("Hi Alice!", None));
        let bridge = bridge(&client);
        let sink = RecordingSink::new();

        let out = bridge.handle_message(USER, "#naga hello", &sink).await.unwrap();
        assert_eq!(out.text(), "Hi Alice!");
        assert_eq!(sink.sent(), vec!["Hi Alice!".to_string()]);
        assert_eq!(client.chat_calls()[0].0, "hello");
    }

    #[tokio::test]
    async fn test_activate_then_custom_prefix() {
        let client = Arc::new(ScriptedClient::new().reply("pong", None));
        let bridge = bridge(&client);
        let sink = RecordingSink::new();

        let out = bridge.handle_message(USER, "#naga activate !ai", &sink).await.unwrap();
        assert_eq!(out.text(), "✅ Custom activation prefix set to: !ai");

        let out = bridge.handle_message(USER, "!ai ping", &sink).await.unwrap();
        assert_eq!(out.text(), "pong");

        // Other users do not get the override.
        assert!(bridge.handle_message("console:bob", "!ai ping", &sink).await.is_none());
    }

    #[tokio::test]
    async fn test_bare_activate_is_hint() {
        let client = Arc::new(ScriptedClient::new());
        let bridge = bridge(&client);
        let out = bridge
            .handle_message(USER, "#naga activate", &RecordingSink::new())
            .await
            .unwrap();
        assert_eq!(out.text(), "❌ Please provide a valid prefix");
    }

    #[tokio::test]
    async fn test_session_commands_skip_remote() {
        let client = Arc::new(ScriptedClient::new().unhealthy());
        let bridge = bridge(&client);
        let sink = RecordingSink::new();

        let out = bridge.handle_message(USER, "#naga session create work", &sink).await.unwrap();
        assert!(out.is_reply());
        assert_eq!(bridge.store().get_active(USER).unwrap().name, "work");
        assert_eq!(client.health_calls(), 0);
        assert!(client.chat_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unhealthy_service_short_circuits() {
        let client = Arc::new(ScriptedClient::new().unhealthy().reply("never", None));
        let bridge = bridge(&client);
        let sink = RecordingSink::new();

        let out = bridge.handle_message(USER, "#naga hello", &sink).await.unwrap();
        assert!(matches!(out, TurnOutcome::Failed(TurnError::RemoteUnavailable { .. })));
        bridge.handle_message(USER, "#naga again", &sink).await.unwrap();

        assert_eq!(client.health_calls(), 1);
        assert!(client.chat_calls().is_empty());
    }

    #[tokio::test]
    async fn test_devmode_routed_to_system_client() {
        let client = Arc::new(ScriptedClient::new());
        let bridge = bridge(&client);

        let out = bridge
            .handle_message(USER, "#naga devmode on", &RecordingSink::new())
            .await
            .unwrap();
        assert_eq!(out.text(), "✅ Developer mode enabled");
        assert_eq!(client.devmode_calls(), vec![true]);
        assert!(client.chat_calls().is_empty());
    }

    #[test]
    fn test_keyword_args() {
        assert_eq!(keyword_args("session list", "session"), Some("list"));
        assert_eq!(keyword_args("session", "session"), Some(""));
        assert_eq!(keyword_args("sessions are fun", "session"), None);
        assert_eq!(keyword_args("activate   !x ", "activate"), Some("!x"));
    }
}
