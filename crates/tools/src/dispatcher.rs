//! Tool dispatcher: runs a model-requested tool against the vault.
//!
//! `execute` is total: every fault becomes a `success: false` result that is
//! fed back to the model, so a bad path or a full disk never aborts the
//! conversation. Direct callers that want the fault itself use `run`.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use dispatch_core::error::ToolError;
use dispatch_core::knowledge::{Category, KnowledgeStore};
use dispatch_core::memory::{LedgerSection, MemoryLedger};
use dispatch_core::tool::{ToolDefinition, ToolResult};
use dispatch_core::Lane;
use tracing::{debug, warn};

use crate::call::{catalog, CreateNoteArgs, ListNotesArgs, UpdateMemoryArgs, UpdateNoteArgs, VaultTool};
use crate::slug::slugify;

pub struct ToolDispatcher {
    store: Arc<dyn KnowledgeStore>,
    ledger: Arc<dyn MemoryLedger>,
}

impl ToolDispatcher {
    pub fn new(store: Arc<dyn KnowledgeStore>, ledger: Arc<dyn MemoryLedger>) -> Self {
        Self { store, ledger }
    }

    /// Definitions to send to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        catalog()
    }

    /// Run a named tool on behalf of `lane`. Never fails.
    pub async fn execute(&self, name: &str, input: &serde_json::Value, lane: Lane) -> ToolResult {
        let outcome = match VaultTool::parse(name, input) {
            Ok(call) => self.run(call, lane).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(result) => {
                debug!(tool = name, lane = %lane, success = result.success, "Tool executed");
                result
            }
            Err(e) => {
                warn!(tool = name, lane = %lane, error = %e, "Tool failed");
                ToolResult::failure(e.to_string())
            }
        }
    }

    /// Run a parsed tool, propagating store faults.
    pub async fn run(&self, call: VaultTool, lane: Lane) -> Result<ToolResult, ToolError> {
        match call {
            VaultTool::UpdateMemory(args) => self.update_memory(args, lane, Local::now().date_naive()).await,
            VaultTool::CreateNote(args) => self.create_note(args).await,
            VaultTool::UpdateNote(args) => self.update_note(args).await,
            VaultTool::ListNotes(args) => self.list_notes(args),
        }
    }

    async fn update_memory(&self, args: UpdateMemoryArgs, lane: Lane, today: NaiveDate) -> Result<ToolResult, ToolError> {
        let note = args.note.trim();
        if note.is_empty() {
            return Ok(ToolResult::failure("Note cannot be empty"));
        }
        self.ledger
            .append(lane, LedgerSection::MemoryLog, today, note)
            .await
            .map_err(|e| failed("update_memory", e))?;
        Ok(ToolResult::ok(format!("Saved to {lane} memory")))
    }

    async fn create_note(&self, args: CreateNoteArgs) -> Result<ToolResult, ToolError> {
        let category = folder("create_note", &args.lane)?;
        let slug = slugify(&args.title);
        let path = self
            .store
            .create_unique(category, &slug, &args.content)
            .await
            .map_err(|e| failed("create_note", e))?;
        Ok(ToolResult::ok(format!("Created {path}")).with_path(path))
    }

    async fn update_note(&self, args: UpdateNoteArgs) -> Result<ToolResult, ToolError> {
        if self.store.snapshot().get(&args.path).is_none() {
            return Ok(ToolResult::failure(format!("Note not found: {}", args.path)));
        }
        self.store
            .write(&args.path, &args.content)
            .await
            .map_err(|e| failed("update_note", e))?;
        Ok(ToolResult::ok(format!("Updated {}", args.path)).with_path(args.path))
    }

    fn list_notes(&self, args: ListNotesArgs) -> Result<ToolResult, ToolError> {
        let category = folder("list_notes", &args.lane)?;
        let notes: Vec<_> = self
            .store
            .snapshot()
            .list_by_category(category)
            .into_iter()
            .map(|d| d.to_ref())
            .collect();
        Ok(ToolResult::ok(format!("{} notes in {category}", notes.len())).with_notes(notes))
    }
}

fn folder(tool: &str, name: &str) -> Result<Category, ToolError> {
    Category::parse(name).ok_or_else(|| ToolError::InvalidArguments {
        tool_name: tool.to_string(),
        reason: format!("unknown folder '{name}'"),
    })
}

fn failed(tool: &str, err: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool.to_string(),
        reason: err.to_string(),
    }
}
