//! Lazy, single-shot health check of the NagaAgent service.
//!
//! The first message that needs the remote service triggers `GET /health`.
//! The result is cached for the life of the process and never rechecked.

use tokio::sync::OnceCell;

use crate::naga_api::ChatClient;

#[derive(Debug, Default)]
pub struct HealthGate {
    healthy: OnceCell<bool>,
}

impl HealthGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the service is usable. Polls the client at most once;
    /// concurrent first callers share the same check.
    pub async fn is_healthy(&self, client: &dyn ChatClient) -> bool {
        *self
            .healthy
            .get_or_init(|| async {
                let healthy = client.health_check().await;
                if healthy {
                    tracing::info!("NagaAgent API is healthy");
                } else {
                    tracing::error!("NagaAgent API did not respond to health check");
                }
                healthy
            })
            .await
    }
}
