//! File-backed history store: `Agents/<lane>/history.json`.
//!
//! Each file holds `{"version": 1, "messages": [...]}`. Loading is lenient:
//! a missing, unreadable, corrupt or future-versioned file yields an empty
//! history so a bad file can never keep a lane from answering.

use std::path::PathBuf;

use async_trait::async_trait;
use dispatch_core::error::VaultError;
use dispatch_core::history::{HistoryRecord, HistoryStore, HISTORY_VERSION};
use dispatch_core::{Lane, Message};
use tracing::{debug, warn};

use crate::atomic::write_atomic;

pub struct FileHistoryStore {
    root: PathBuf,
}

impl FileHistoryStore {
    /// `root` is the vault root; files live under `Agents/`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, lane: Lane) -> PathBuf {
        self.root
            .join(crate::AGENTS_DIR)
            .join(lane.id())
            .join("history.json")
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn load(&self, lane: Lane) -> Vec<Message> {
        let path = self.path_for(lane);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(lane = %lane, error = %e, "History unreadable, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<HistoryRecord>(&content) {
            Ok(record) if record.version == HISTORY_VERSION => {
                debug!(lane = %lane, count = record.messages.len(), "History restored");
                record.messages
            }
            Ok(record) => {
                warn!(lane = %lane, version = record.version, "Unknown history version, starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(lane = %lane, error = %e, "Corrupt history, starting empty");
                Vec::new()
            }
        }
    }

    async fn save(&self, lane: Lane, messages: &[Message]) -> Result<(), VaultError> {
        let path = self.path_for(lane);
        let record = HistoryRecord::capped(messages);
        let json = serde_json::to_string_pretty(&record).map_err(|e| VaultError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        write_atomic(&path, json)
            .await
            .map_err(|e| VaultError::io(&path, e))
    }
}
