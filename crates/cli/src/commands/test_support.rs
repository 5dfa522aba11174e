//! In-memory engines for command tests.

use std::sync::Arc;

use async_trait::async_trait;
use dispatch_agent::{DispatchEngine, LaneBook};
use dispatch_config::AppConfig;
use dispatch_core::error::ProviderError;
use dispatch_core::provider::{Provider, ProviderRequest, ProviderResponse, StopReason};
use dispatch_core::Message;
use dispatch_vault::{InMemoryHistory, InMemoryVault};

/// Answers with a fixed reply, or echoes the last user message.
struct TestProvider {
    reply: Option<String>,
}

#[async_trait]
impl Provider for TestProvider {
    fn name(&self) -> &str {
        "test"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let text = match &self.reply {
            Some(reply) => reply.clone(),
            None => {
                let last = request.messages.last().map(|m| m.text()).unwrap_or_default();
                format!("echo: {last}")
            }
        };
        Ok(ProviderResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: None,
            model: request.model,
        })
    }
}

async fn engine_with(reply: Option<String>, vault: Arc<InMemoryVault>) -> DispatchEngine {
    let mut config = AppConfig::default();
    config.conversation.chunk_delay_ms = 0;
    DispatchEngine::new(
        &config,
        Arc::new(TestProvider { reply }),
        vault.clone(),
        vault,
        Arc::new(InMemoryHistory::new()),
        LaneBook::default(),
    )
    .await
}

pub async fn echo_engine() -> (DispatchEngine, Arc<InMemoryVault>) {
    let vault = Arc::new(InMemoryVault::new());
    (engine_with(None, vault.clone()).await, vault)
}

pub async fn fixed_engine(reply: &str, vault: Arc<InMemoryVault>) -> DispatchEngine {
    engine_with(Some(reply.to_string()), vault).await
}
