//! Tool types shared by the dispatcher, the conversation loop and providers.
//!
//! The tool set itself is closed and lives in `dispatch-tools`; this module
//! only defines what crosses crate boundaries: the catalog entry sent to the
//! model, the invocation the model sends back, and the result record.

use serde::{Deserialize, Serialize};

use crate::knowledge::NoteRef;

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A request from the model to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Correlation id (matches the model's tool_use id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub input: serde_json::Value,
}

/// The result of a tool execution. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// Human-readable outcome or failure description
    pub message: String,

    /// Corpus-relative path written, for note tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Notes listed, for `list_notes`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<NoteRef>>,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            path: None,
            notes: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            path: None,
            notes: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_notes(mut self, notes: Vec<NoteRef>) -> Self {
        self.notes = Some(notes);
        self
    }

    /// JSON text fed back to the model as the tool-result content.
    pub fn to_model_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted() {
        let json = serde_json::to_value(ToolResult::failure("Note cannot be empty")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "message": "Note cannot be empty"})
        );
    }

    #[test]
    fn model_content_includes_path() {
        let content = ToolResult::ok("Created note").with_path("Jobs/offer.md").to_model_content();
        assert!(content.contains("\"path\":\"Jobs/offer.md\""));
        assert!(content.contains("\"success\":true"));
    }
}
