//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Streaming via SSE with `content_block_delta` events

use async_trait::async_trait;
use dispatch_core::error::ProviderError;
use dispatch_core::message::{ContentPart, Message, MessageContent, Role};
use dispatch_core::provider::*;
use dispatch_core::tool::ToolDefinition;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert messages to Anthropic API format with content blocks.
    fn to_api_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
        messages
            .iter()
            .map(|msg| AnthropicMessage {
                role: match msg.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                },
                content: match &msg.content {
                    MessageContent::Text(text) => AnthropicContent::Text(text.clone()),
                    MessageContent::Parts(parts) => {
                        AnthropicContent::Blocks(parts.iter().map(ContentBlock::from).collect())
                    }
                },
            })
            .collect()
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "max_tokens": request.max_tokens,
        });

        if !request.system.is_empty() {
            body["system"] = serde_json::json!(request.system);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        body
    }

    async fn send(&self, body: &serde_json::Value, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 200 {
            return Ok(response);
        }
        let error_body = response.text().await.unwrap_or_default();
        Err(map_status(status, error_body))
    }
}

/// Map a non-200 status to a typed provider error.
fn map_status(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited { retry_after_secs: 5 },
        401 | 403 => ProviderError::AuthenticationFailed("Invalid Anthropic API key".into()),
        _ => {
            warn!(status, body = %body, "Anthropic API error");
            ProviderError::ApiError {
                status_code: status,
                message: body,
            }
        }
    }
}

#[async_trait]
impl dispatch_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);

        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self.send(&body, false).await?;

        let api_resp: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Anthropic response: {e}"),
            })?;

        Ok(Self::response_to_provider_response(api_resp))
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let body = Self::request_body(&request, true);

        debug!(provider = "anthropic", model = %request.model, "Sending streaming request");

        let response = self.send(&body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLines::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                lines.push(&bytes);

                while let Some(line) = lines.next_line() {
                    let chunk = match parse_sse_line(&line) {
                        Some(SseSignal::Chunk(chunk)) => chunk,
                        Some(SseSignal::Failed(err)) => {
                            let _ = tx.send(Err(err)).await;
                            return;
                        }
                        None => continue,
                    };
                    let done = chunk.done;
                    if tx.send(Ok(chunk)).await.is_err() || done {
                        return;
                    }
                }
            }

            // Stream ended without message_stop: send final chunk
            let _ = tx
                .send(Ok(StreamChunk {
                    content: None,
                    done: true,
                    usage: None,
                }))
                .await;
        });

        Ok(rx)
    }
}

/// Splits a byte stream into lines.
///
/// Network chunks may end inside a multi-byte character, so bytes are held
/// until a full line is present and only then decoded.
#[derive(Debug, Default)]
struct SseLines {
    pending: Vec<u8>,
}

impl SseLines {
    fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// The next complete line without its terminator, if one has arrived.
    fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=end).collect();
        let line = String::from_utf8_lossy(&raw[..end]);
        Some(line.trim_end_matches('\r').to_string())
    }
}

/// What one SSE line means for the consumer.
#[derive(Debug)]
enum SseSignal {
    Chunk(StreamChunk),
    Failed(ProviderError),
}

/// Interpret one line of an Anthropic event stream.
///
/// Only text deltas, usage, the stop marker and in-stream errors matter;
/// everything else (pings, block starts, comments) yields `None`.
fn parse_sse_line(line: &str) -> Option<SseSignal> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    if let Some(event_type) = line.strip_prefix("event: ") {
        if event_type.trim() == "message_stop" {
            return Some(SseSignal::Chunk(StreamChunk {
                content: None,
                done: true,
                usage: None,
            }));
        }
        return None;
    }

    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }

    let event: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
            return None;
        }
    };

    match event["type"].as_str().unwrap_or("") {
        "content_block_delta" => {
            let delta = &event["delta"];
            if delta["type"].as_str() != Some("text_delta") {
                return None;
            }
            delta["text"].as_str().map(|text| {
                SseSignal::Chunk(StreamChunk {
                    content: Some(text.to_string()),
                    done: false,
                    usage: None,
                })
            })
        }
        "message_delta" => {
            let out = event["usage"]["output_tokens"].as_u64()?;
            Some(SseSignal::Chunk(StreamChunk {
                content: None,
                done: false,
                usage: Some(Usage {
                    input_tokens: event["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
                    output_tokens: out as u32,
                }),
            }))
        }
        "error" => {
            let message = event["error"]["message"]
                .as_str()
                .unwrap_or("unknown stream error")
                .to_string();
            Some(SseSignal::Failed(ProviderError::StreamInterrupted(message)))
        }
        _ => None,
    }
}

impl AnthropicProvider {
    /// Convert Anthropic API response to our ProviderResponse.
    fn response_to_provider_response(resp: AnthropicResponse) -> ProviderResponse {
        let parts: Vec<ContentPart> = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(ContentPart::Text { text }),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    Some(ContentPart::ToolUse { id, name, input })
                }
                ResponseContentBlock::Other => None,
            })
            .collect();

        let has_tool_use = parts
            .iter()
            .any(|p| matches!(p, ContentPart::ToolUse { .. }));
        let message = if has_tool_use {
            Message::with_parts(Role::Assistant, parts)
        } else {
            let text = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");
            Message::assistant(text)
        };

        let stop_reason = match resp.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => StopReason::EndTurn,
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            _ => StopReason::Other,
        };

        ProviderResponse {
            message,
            stop_reason,
            usage: Some(Usage {
                input_tokens: resp.usage.input_tokens,
                output_tokens: resp.usage.output_tokens,
            }),
            model: resp.model,
        }
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

impl From<&ContentPart> for ContentBlock {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => ContentBlock::Text { text: text.clone() },
            ContentPart::ToolUse { id, name, input } => ContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentPart::ToolResult { tool_use_id, content } => ContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::Provider;

    fn chunk(signal: Option<SseSignal>) -> StreamChunk {
        match signal {
            Some(SseSignal::Chunk(c)) => c,
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn constructor() {
        let provider = AnthropicProvider::new("sk-ant-test");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn constructor_with_base_url() {
        let provider = AnthropicProvider::new("sk-ant-test").with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
    }

    #[test]
    fn message_conversion_user_assistant() {
        let messages = vec![Message::user("Hello"), Message::assistant("Hi!")];
        let api_msgs = AnthropicProvider::to_api_messages(&messages);
        assert_eq!(api_msgs.len(), 2);
        assert_eq!(api_msgs[0].role, "user");
        assert_eq!(api_msgs[1].role, "assistant");
        assert!(matches!(api_msgs[0].content, AnthropicContent::Text(_)));
    }

    #[test]
    fn message_conversion_with_tool_turns() {
        let call = Message::with_parts(
            Role::Assistant,
            vec![
                ContentPart::Text { text: "Let me check".into() },
                ContentPart::ToolUse {
                    id: "toolu_123".into(),
                    name: "list_notes".into(),
                    input: serde_json::json!({"lane": "Jobs"}),
                },
            ],
        );
        let result = Message::with_parts(
            Role::User,
            vec![ContentPart::ToolResult {
                tool_use_id: "toolu_123".into(),
                content: "{\"success\":true}".into(),
            }],
        );

        let api_msgs = AnthropicProvider::to_api_messages(&[call, result]);
        let json = serde_json::to_value(&api_msgs).unwrap();
        assert_eq!(json[0]["content"][0]["type"], "text");
        assert_eq!(json[0]["content"][1]["type"], "tool_use");
        assert_eq!(json[0]["content"][1]["input"]["lane"], "Jobs");
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[1]["content"][0]["type"], "tool_result");
        assert_eq!(json[1]["content"][0]["tool_use_id"], "toolu_123");
    }

    #[test]
    fn request_body_places_system_and_tools() {
        let request = ProviderRequest::new("claude-opus-4-6", "Be brief.", vec![Message::user("hi")])
            .with_max_tokens(400)
            .with_tools(vec![ToolDefinition {
                name: "update_memory".into(),
                description: "Save a note".into(),
                parameters: serde_json::json!({"type": "object"}),
            }]);
        let body = AnthropicProvider::request_body(&request, true);
        assert_eq!(body["system"], "Be brief.");
        assert_eq!(body["max_tokens"], 400);
        assert_eq!(body["stream"], true);
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");

        let bare = AnthropicProvider::request_body(&ProviderRequest::new("m", "", vec![]), false);
        assert!(bare.get("system").is_none());
        assert!(bare.get("tools").is_none());
        assert!(bare.get("stream").is_none());
    }

    #[test]
    fn parse_text_response() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_01",
                "model": "claude-opus-4-6",
                "content": [{"type": "text", "text": "Hello!"}],
                "usage": {"input_tokens": 10, "output_tokens": 5},
                "stop_reason": "end_turn"
            }"#,
        )
        .unwrap();

        let pr = AnthropicProvider::response_to_provider_response(resp);
        assert_eq!(pr.message.as_text(), Some("Hello!"));
        assert!(pr.is_terminal());
        assert_eq!(pr.stop_reason, StopReason::EndTurn);
        assert_eq!(pr.usage.unwrap().output_tokens, 5);
        assert_eq!(pr.model, "claude-opus-4-6");
    }

    #[test]
    fn parse_tool_use_response() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_02",
                "model": "claude-opus-4-6",
                "content": [
                    {"type": "text", "text": "Saving that"},
                    {"type": "tool_use", "id": "toolu_abc", "name": "update_memory", "input": {"note": "terse feedback"}}
                ],
                "usage": {"input_tokens": 20, "output_tokens": 10},
                "stop_reason": "tool_use"
            }"#,
        )
        .unwrap();

        let pr = AnthropicProvider::response_to_provider_response(resp);
        assert!(!pr.is_terminal());
        assert_eq!(pr.stop_reason, StopReason::ToolUse);
        let calls = pr.tool_invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_abc");
        assert_eq!(calls[0].input["note"], "terse feedback");
        assert_eq!(pr.message.text(), "Saving that");
    }

    #[test]
    fn unknown_blocks_are_skipped() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "model": "m",
                "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "text", "text": "Answer."}
                ],
                "usage": {"input_tokens": 1, "output_tokens": 1}
            }"#,
        )
        .unwrap();
        let pr = AnthropicProvider::response_to_provider_response(resp);
        assert_eq!(pr.message.as_text(), Some("Answer."));
        assert_eq!(pr.stop_reason, StopReason::Other);
    }

    #[test]
    fn sse_text_delta() {
        let line = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#;
        let c = chunk(parse_sse_line(line));
        assert_eq!(c.content.as_deref(), Some("Hel"));
        assert!(!c.done);
    }

    #[test]
    fn sse_stop_and_noise() {
        assert!(chunk(parse_sse_line("event: message_stop")).done);
        assert!(parse_sse_line("event: content_block_delta").is_none());
        assert!(parse_sse_line(": ping").is_none());
        assert!(parse_sse_line("data: {not json").is_none());
        assert!(parse_sse_line(r#"data: {"type":"ping"}"#).is_none());
    }

    #[test]
    fn sse_usage_and_error() {
        let usage = chunk(parse_sse_line(
            r#"data: {"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":42}}"#,
        ));
        assert_eq!(usage.usage.unwrap().output_tokens, 42);

        let failed = parse_sse_line(
            r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        assert!(matches!(
            failed,
            Some(SseSignal::Failed(ProviderError::StreamInterrupted(m))) if m == "Overloaded"
        ));
    }

    #[test]
    fn sse_lines_hold_split_characters() {
        let line = "data: caf\u{e9}\n".as_bytes();
        let cut = line.len() - 2; // inside the two-byte é
        let mut lines = SseLines::default();
        lines.push(&line[..cut]);
        assert!(lines.next_line().is_none());
        lines.push(&line[cut..]);
        assert_eq!(lines.next_line().as_deref(), Some("data: caf\u{e9}"));
        assert!(lines.next_line().is_none());
    }

    #[test]
    fn sse_lines_strip_carriage_returns() {
        let mut lines = SseLines::default();
        lines.push(b"event: ping\r\ndata: {}\r\n\r\npartial");
        assert_eq!(lines.next_line().as_deref(), Some("event: ping"));
        assert_eq!(lines.next_line().as_deref(), Some("data: {}"));
        assert_eq!(lines.next_line().as_deref(), Some(""));
        assert!(lines.next_line().is_none());
    }

    /// Serve one chunked SSE response, split at the given byte offsets.
    async fn serve_chunked(body: Vec<u8>, cuts: Vec<usize>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n")
                .await
                .unwrap();
            let mut start = 0;
            for end in cuts.into_iter().chain(std::iter::once(body.len())) {
                let piece = &body[start..end];
                socket.write_all(format!("{:x}\r\n", piece.len()).as_bytes()).await.unwrap();
                socket.write_all(piece).await.unwrap();
                socket.write_all(b"\r\n").await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                start = end;
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn stream_keeps_characters_split_across_chunks() {
        let body = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"caf\u{e9} \u{2014} ok\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        )
        .as_bytes()
        .to_vec();
        let e_acute = body.windows(2).position(|w| w == [0xC3, 0xA9]).unwrap();
        let dash = body.windows(3).position(|w| w == [0xE2, 0x80, 0x94]).unwrap();
        let base_url = serve_chunked(body, vec![e_acute + 1, dash + 2]).await;

        let provider = AnthropicProvider::new("sk-ant-test").with_base_url(base_url);
        let mut rx = provider
            .stream(ProviderRequest::new("m", "", vec![Message::user("hi")]))
            .await
            .unwrap();
        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            text.push_str(chunk.content.as_deref().unwrap_or(""));
            if chunk.done {
                break;
            }
        }
        assert_eq!(text, "caf\u{e9} \u{2014} ok");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(map_status(429, String::new()), ProviderError::RateLimited { .. }));
        assert!(matches!(map_status(401, String::new()), ProviderError::AuthenticationFailed(_)));
        assert!(matches!(
            map_status(529, "overloaded".into()),
            ProviderError::ApiError { status_code: 529, .. }
        ));
    }
}
