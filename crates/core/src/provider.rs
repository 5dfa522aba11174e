//! Provider trait: the abstraction over the model service.
//!
//! A Provider sends a system text, an ordered message history and an
//! optional tool catalog to an LLM. It answers either with one complete
//! message (which may request tools) or with a stream of text chunks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::{Message, MessageContent};
use crate::tool::{ToolDefinition, ToolInvocation};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-opus-4-6")
    pub model: String,

    /// System text sent ahead of the conversation
    #[serde(default)]
    pub system: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            messages,
            max_tokens: 1024,
            tools: Vec::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message
    pub message: Message,

    /// Why generation stopped
    pub stop_reason: StopReason,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

impl ProviderResponse {
    /// Tool invocations requested by this response. Empty for a terminal one.
    pub fn tool_invocations(&self) -> Vec<ToolInvocation> {
        self.message
            .tool_uses()
            .into_iter()
            .map(|(id, name, input)| ToolInvocation {
                id: id.to_string(),
                name: name.to_string(),
                input: input.clone(),
            })
            .collect()
    }

    /// A response is terminal when it requests no tools.
    pub fn is_terminal(&self) -> bool {
        match &self.message.content {
            MessageContent::Text(_) => true,
            MessageContent::Parts(_) => self.message.tool_uses().is_empty(),
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial text delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Receiver side of a streamed completion.
pub type ChunkReceiver =
    tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// The core Provider trait.
///
/// The conversation loop and the standup call `complete()` or `stream()`
/// without knowing which backend answers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of text chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as a single chunk.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx.send(Ok(StreamChunk {
            content: Some(response.message.text()),
            done: true,
            usage: response.usage,
        })).await;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentPart, Role};

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let last = request.messages.last().map(|m| m.text()).unwrap_or_default();
            Ok(ProviderResponse {
                message: Message::assistant(last),
                stop_reason: StopReason::EndTurn,
                usage: None,
                model: request.model,
            })
        }
    }

    #[test]
    fn tool_use_response_is_not_terminal() {
        let response = ProviderResponse {
            message: Message::with_parts(
                Role::Assistant,
                vec![
                    ContentPart::Text { text: "Saving.".into() },
                    ContentPart::ToolUse {
                        id: "toolu_9".into(),
                        name: "update_memory".into(),
                        input: serde_json::json!({"note": "likes tea"}),
                    },
                ],
            ),
            stop_reason: StopReason::ToolUse,
            usage: None,
            model: "m".into(),
        };
        assert!(!response.is_terminal());
        let calls = response.tool_invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "update_memory");
        assert_eq!(calls[0].id, "toolu_9");
    }

    #[tokio::test]
    async fn default_stream_wraps_complete() {
        let request = ProviderRequest::new("m", "", vec![Message::user("ping")]);
        let mut rx = Echo.stream(request).await.unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("ping"));
        assert!(chunk.done);
        assert!(rx.recv().await.is_none());
    }
}
