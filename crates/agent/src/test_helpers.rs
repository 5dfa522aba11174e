//! Shared test helpers: a scripted model provider.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use dispatch_core::error::ProviderError;
use dispatch_core::message::{ContentPart, Message, Role};
use dispatch_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StopReason, StreamChunk};

/// What one scripted call answers.
#[derive(Clone)]
pub enum Reply {
    Text(String),
    Tools(Vec<(String, serde_json::Value)>),
    Fail(ProviderError),
    /// Never answers.
    Hang,
}

struct Rule {
    needle: String,
    delay: Duration,
    reply: Reply,
}

/// A provider that answers from a script.
///
/// Calls whose system prompt contains a routed needle take that rule's reply
/// after its delay; every other call takes the next reply from the queue.
/// Panics if the queue runs dry.
#[derive(Default)]
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Reply>>,
    rules: Vec<Rule>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            queue: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(vec![Reply::Text(text.into())])
    }

    pub fn route(mut self, needle: &str, delay: Duration, reply: Reply) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            delay,
            reply,
        });
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    async fn next_reply(&self, request: &ProviderRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        let routed = self
            .rules
            .iter()
            .find(|r| request.system.contains(&r.needle))
            .map(|r| (r.delay, r.reply.clone()));
        if let Some((delay, reply)) = routed {
            tokio::time::sleep(delay).await;
            return reply;
        }
        let next = self.queue.lock().unwrap().pop_front();
        next.unwrap_or_else(|| panic!("ScriptedProvider: no reply left for call #{}", self.call_count()))
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        stop_reason: StopReason::EndTurn,
        usage: None,
        model: "scripted".into(),
    }
}

pub fn tool_response(calls: &[(String, serde_json::Value)]) -> ProviderResponse {
    let parts = calls
        .iter()
        .enumerate()
        .map(|(i, (name, input))| ContentPart::ToolUse {
            id: format!("toolu_{i}"),
            name: name.clone(),
            input: input.clone(),
        })
        .collect();
    ProviderResponse {
        message: Message::with_parts(Role::Assistant, parts),
        stop_reason: StopReason::ToolUse,
        usage: None,
        model: "scripted".into(),
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next_reply(&request).await {
            Reply::Text(text) => Ok(text_response(&text)),
            Reply::Tools(calls) => Ok(tool_response(&calls)),
            Reply::Fail(e) => Err(e),
            Reply::Hang => std::future::pending().await,
        }
    }

    /// Streams a text reply one word at a time.
    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let text = match self.next_reply(&request).await {
            Reply::Text(text) => text,
            Reply::Tools(_) => String::new(),
            Reply::Fail(e) => return Err(e),
            Reply::Hang => std::future::pending().await,
        };
        let words: Vec<String> = text.split_inclusive(' ').map(str::to_string).collect();
        let (tx, rx) = tokio::sync::mpsc::channel(words.len() + 1);
        for word in words {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(word),
                    ..StreamChunk::default()
                }))
                .await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                done: true,
                ..StreamChunk::default()
            }))
            .await;
        Ok(rx)
    }
}
