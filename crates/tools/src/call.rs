//! The closed set of tools and their argument types.

use dispatch_core::error::ToolError;
use dispatch_core::tool::ToolDefinition;
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateMemoryArgs {
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateNoteArgs {
    /// Target folder, e.g. "Jobs"
    pub lane: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateNoteArgs {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListNotesArgs {
    pub lane: String,
}

/// A parsed tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum VaultTool {
    UpdateMemory(UpdateMemoryArgs),
    CreateNote(CreateNoteArgs),
    UpdateNote(UpdateNoteArgs),
    ListNotes(ListNotesArgs),
}

impl VaultTool {
    pub const NAMES: [&'static str; 4] = ["update_memory", "create_note", "update_note", "list_notes"];

    /// Parse a named invocation. Unknown names and malformed arguments are typed faults.
    pub fn parse(name: &str, input: &serde_json::Value) -> Result<Self, ToolError> {
        match name {
            "update_memory" => args(name, input).map(VaultTool::UpdateMemory),
            "create_note" => args(name, input).map(VaultTool::CreateNote),
            "update_note" => args(name, input).map(VaultTool::UpdateNote),
            "list_notes" => args(name, input).map(VaultTool::ListNotes),
            other => Err(ToolError::NotFound(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VaultTool::UpdateMemory(_) => "update_memory",
            VaultTool::CreateNote(_) => "create_note",
            VaultTool::UpdateNote(_) => "update_note",
            VaultTool::ListNotes(_) => "list_notes",
        }
    }
}

fn args<T: DeserializeOwned>(tool: &str, input: &serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(input.clone()).map_err(|e| ToolError::InvalidArguments {
        tool_name: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Tool definitions sent to the model with every lane request.
pub fn catalog() -> Vec<ToolDefinition> {
    let folders = serde_json::json!(["Jobs", "Build", "Learn", "Home", "Write", "Self", "Daily"]);
    vec![
        ToolDefinition {
            name: "update_memory".into(),
            description: "Save something worth remembering about the user to your private memory. \
                Use it for preferences, decisions, and facts that should shape future answers."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "note": {"type": "string", "description": "One concise sentence to remember"}
                },
                "required": ["note"]
            }),
        },
        ToolDefinition {
            name: "create_note".into(),
            description: "Create a new Markdown note in a vault folder. Never overwrites an existing note."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "lane": {"type": "string", "enum": folders, "description": "Folder to create the note in"},
                    "title": {"type": "string", "description": "Note title; also used for the file name"},
                    "content": {"type": "string", "description": "Full Markdown body"}
                },
                "required": ["lane", "title", "content"]
            }),
        },
        ToolDefinition {
            name: "update_note".into(),
            description: "Replace the full content of an existing note. Use list_notes to find its path first."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Vault-relative path, e.g. Jobs/acme.md"},
                    "content": {"type": "string", "description": "New full Markdown body"}
                },
                "required": ["path", "content"]
            }),
        },
        ToolDefinition {
            name: "list_notes".into(),
            description: "List the titles and paths of every note in a vault folder.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "lane": {"type": "string", "enum": folders, "description": "Folder to list"}
                },
                "required": ["lane"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_each_tool() {
        let call = VaultTool::parse("create_note", &json!({"lane": "Jobs", "title": "T", "content": "C"})).unwrap();
        assert_eq!(call.name(), "create_note");
        assert!(matches!(call, VaultTool::CreateNote(CreateNoteArgs { ref lane, .. }) if lane == "Jobs"));

        assert!(matches!(
            VaultTool::parse("update_memory", &json!({"note": "x"})).unwrap(),
            VaultTool::UpdateMemory(_)
        ));
        assert!(matches!(
            VaultTool::parse("list_notes", &json!({"lane": "Home"})).unwrap(),
            VaultTool::ListNotes(_)
        ));
    }

    #[test]
    fn unknown_name_is_not_found() {
        let err = VaultTool::parse("delete_note", &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "delete_note"));
    }

    #[test]
    fn missing_argument_is_invalid() {
        let err = VaultTool::parse("update_note", &json!({"path": "Jobs/a.md"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn catalog_matches_closed_set() {
        let names: Vec<_> = catalog().into_iter().map(|t| t.name).collect();
        assert_eq!(names, VaultTool::NAMES);
    }
}
