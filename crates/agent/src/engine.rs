//! The engine: one object wiring vault, history, model and lanes together
//! for the HTTP surface and the CLI.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use dispatch_config::AppConfig;
use dispatch_core::error::{ToolError, VaultError};
use dispatch_core::knowledge::truncate_chars;
use dispatch_core::{
    Category, DispatchEvent, Document, Error, HistoryStore, KnowledgeStore, Lane, LedgerSection,
    MemoryLedger, Provider, Role,
};
use dispatch_vault::{FileHistoryStore, FileVault};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::context::ContextAssembler;
use crate::conversation_store::ConversationStore;
use crate::draft::{Draft, is_vault_relative};
use crate::lanes::{LaneBook, LaneProfile};
use crate::loop_runner::ConversationLoop;
use crate::standup::StandupOrchestrator;

/// One display turn of a lane conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayTurn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LaneSummary {
    pub id: Lane,
    pub name: &'static str,
    pub emoji: &'static str,
}

impl From<&LaneProfile> for LaneSummary {
    fn from(profile: &LaneProfile) -> Self {
        Self {
            id: profile.lane,
            name: profile.name,
            emoji: profile.emoji,
        }
    }
}

/// Longest snippet shown per search hit.
const SNIPPET_CHARS: usize = 120;

/// One note matching a search, with the first line that matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub path: String,
    pub category: Category,
    pub snippet: String,
}

impl SearchHit {
    /// Describe a document returned by [`Corpus::search`](dispatch_core::Corpus::search).
    pub fn from_match(doc: &Document, query: &str) -> Self {
        let needle = query.trim().to_lowercase();
        let line = doc
            .content
            .lines()
            .find(|line| line.to_lowercase().contains(&needle))
            .unwrap_or_default();
        Self {
            title: doc.title.clone(),
            path: doc.path.clone(),
            category: doc.category,
            snippet: truncate_chars(line.trim(), SNIPPET_CHARS).to_string(),
        }
    }
}

/// Vault and lane overview.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub notes: usize,
    pub lanes: Vec<LaneSummary>,
    pub model: String,
}

pub struct DispatchEngine {
    store: Arc<dyn KnowledgeStore>,
    ledger: Arc<dyn MemoryLedger>,
    conversations: Arc<ConversationStore>,
    lanes: Arc<LaneBook>,
    chat: ConversationLoop,
    standup: StandupOrchestrator,
    model: String,
}

impl DispatchEngine {
    /// Open the configured vault and connect to the configured model.
    pub async fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let provider = Arc::new(dispatch_providers::build_from_config(config)?);
        let vault = Arc::new(FileVault::open(&config.vault_path).await?);
        let history = Arc::new(FileHistoryStore::new(&config.vault_path));
        let lanes = LaneBook::from_config(config)
            .with_prompt_files(&config.vault_path)
            .await;
        info!(vault = %config.vault_path.display(), notes = vault.snapshot().len(), "Engine ready");
        Ok(Self::new(config, provider, vault.clone(), vault, history, lanes).await)
    }

    /// Wire an engine from explicit collaborators.
    pub async fn new(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn KnowledgeStore>,
        ledger: Arc<dyn MemoryLedger>,
        history: Arc<dyn HistoryStore>,
        lanes: LaneBook,
    ) -> Self {
        let lanes = Arc::new(lanes);
        let conv = &config.conversation;
        let timeout = conv.model_timeout_secs.map(Duration::from_secs);
        let conversations = Arc::new(ConversationStore::restore(history, conv.history_cap).await);

        let chat = ConversationLoop::new(
            provider.clone(),
            store.clone(),
            ledger.clone(),
            conversations.clone(),
            &config.provider.model,
        )
        .with_lanes(lanes.clone())
        .with_assembler(ContextAssembler::from_config(&config.context))
        .with_max_tokens(conv.chat_max_tokens)
        .with_history_window(conv.history_window)
        .with_max_iterations(conv.max_tool_iterations)
        .with_chunking(conv.chunk_chars, Duration::from_millis(conv.chunk_delay_ms))
        .with_model_timeout(timeout);

        let standup = StandupOrchestrator::new(
            provider,
            store.clone(),
            ledger.clone(),
            &config.provider.standup_model,
            &config.provider.model,
        )
        .with_lanes(lanes.clone())
        .with_max_tokens(config.standup.report_max_tokens, config.standup.synthesis_max_tokens)
        .with_model_timeout(timeout);

        Self {
            store,
            ledger,
            conversations,
            lanes,
            chat,
            standup,
            model: config.provider.model.clone(),
        }
    }

    pub fn lanes(&self) -> &LaneBook {
        &self.lanes
    }

    /// Send a message to a lane.
    pub fn chat(&self, lane: Lane, message: impl Into<String>) -> mpsc::Receiver<DispatchEvent> {
        self.chat.run_stream(lane, message)
    }

    pub fn standup(&self) -> mpsc::Receiver<DispatchEvent> {
        self.standup.run_stream()
    }

    pub async fn display_history(&self, lane: Lane) -> Vec<DisplayTurn> {
        self.conversations
            .display(lane)
            .await
            .into_iter()
            .map(|(role, text)| DisplayTurn { role, text })
            .collect()
    }

    pub async fn clear_history(&self, lane: Lane) {
        self.conversations.clear(lane).await;
        info!(lane = %lane, "History cleared");
    }

    /// Record an explicit "remember this" under the lane's conversation log.
    pub async fn remember(&self, lane: Lane, note: &str) -> Result<(), Error> {
        let note = note.trim();
        if note.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool_name: "remember".into(),
                reason: "note cannot be empty".into(),
            }
            .into());
        }
        self.ledger
            .append(lane, LedgerSection::ConversationLog, Local::now().date_naive(), note)
            .await?;
        Ok(())
    }

    /// Re-read the vault from disk. Returns the note count.
    pub async fn refresh(&self) -> Result<usize, Error> {
        let notes = self.store.reload().await?;
        info!(notes, "Vault refreshed");
        Ok(notes)
    }

    /// Case-insensitive search over the freshly loaded vault.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, Error> {
        self.store.reload().await?;
        let corpus = self.store.snapshot();
        Ok(corpus.search(query).into_iter().map(|doc| SearchHit::from_match(doc, query)).collect())
    }

    /// Have the coordinator draft a new note. Nothing is written until
    /// [`save_draft`](Self::save_draft).
    pub async fn draft(&self, request: &str) -> Result<Draft, Error> {
        let mut draft = self.chat.draft(request).await?;
        if let Some(path) = &draft.save_as {
            draft.replaces = self.store.snapshot().get(path).is_some();
        }
        Ok(draft)
    }

    /// Write a confirmed draft to its proposed path.
    pub async fn save_draft(&self, draft: &Draft) -> Result<String, Error> {
        let path = match &draft.save_as {
            Some(path) if is_vault_relative(path) => path.clone(),
            other => {
                return Err(VaultError::InvalidPath(other.clone().unwrap_or_default()).into());
            }
        };
        self.store.write(&path, &format!("{}\n", draft.content.trim_end())).await?;
        info!(path = %path, replaced = draft.replaces, "Draft saved");
        Ok(path)
    }

    pub async fn status(&self) -> Result<StatusReport, Error> {
        let notes = self.store.reload().await?;
        Ok(StatusReport {
            notes,
            lanes: self.lanes.all().iter().map(LaneSummary::from).collect(),
            model: self.model.clone(),
        })
    }
}
