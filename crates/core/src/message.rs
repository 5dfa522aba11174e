//! Message and Conversation domain types.
//!
//! A message is either plain text or a list of typed parts. Tool calls and
//! tool results travel as parts so that a persisted conversation can be
//! replayed to the model exactly as it happened.

use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (tool results are sent back under this role too)
    User,
    /// The model
    Assistant,
}

/// One typed part of a structured message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// Message content: plain text or a sequence of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// Plain text or typed parts
    pub content: MessageContent,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a message from typed parts.
    pub fn with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
        }
    }

    /// The plain text of this message, if it is a plain-text turn.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(_) => None,
        }
    }

    /// Concatenated text of every text part (or the plain text).
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Tool invocations requested in this message.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        match &self.content {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolUse { id, name, input } => {
                        Some((id.as_str(), name.as_str(), input))
                    }
                    _ => None,
                })
                .collect(),
        }
    }

    /// Whether this message carries any tool-result parts.
    pub fn has_tool_results(&self) -> bool {
        matches!(&self.content, MessageContent::Parts(parts)
            if parts.iter().any(|p| matches!(p, ContentPart::ToolResult { .. })))
    }
}

/// A lane conversation: an ordered, capped sequence of messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Messages in chronological order
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop the oldest messages until at most `max` remain.
    pub fn cap(&mut self, max: usize) {
        if self.messages.len() > max {
            let excess = self.messages.len() - max;
            self.messages.drain(..excess);
        }
    }

    /// The most recent `window` messages, advanced so the slice starts on a
    /// plain user text turn. A window that would open on an assistant turn
    /// or an orphaned tool result is not a valid model request.
    pub fn recent_window(&self, window: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(window);
        let offset = self.messages[start..]
            .iter()
            .position(|m| m.role == Role::User && m.as_text().is_some())
            .unwrap_or(self.messages.len() - start);
        &self.messages[start + offset..]
    }

    /// Plain user/assistant text turns, for display. Tool turns are dropped.
    pub fn display_turns(&self) -> Vec<(Role, String)> {
        self.messages
            .iter()
            .filter_map(|m| m.as_text().map(|t| (m.role, t.to_string())))
            .filter(|(_, t)| !t.is_empty())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
