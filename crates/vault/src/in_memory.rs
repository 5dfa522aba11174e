//! In-memory stores: useful for testing and ephemeral sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use dispatch_core::error::VaultError;
use dispatch_core::history::{HistoryRecord, HistoryStore};
use dispatch_core::knowledge::{Category, Corpus, Document, KnowledgeStore};
use dispatch_core::memory::{append_to_section, ledger_row, LedgerSection, MemoryLedger};
use dispatch_core::{Lane, Message};
use tokio::sync::Mutex;

/// A vault that lives entirely in memory.
#[derive(Default)]
pub struct InMemoryVault {
    documents: RwLock<Vec<Document>>,
    corpus: RwLock<Arc<Corpus>>,
    ledgers: Mutex<HashMap<Lane, String>>,
    fail_writes: AtomicBool,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a vault with `(path, content)` pairs, all modified `now`.
    pub fn with_notes<'a>(notes: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let vault = Self::new();
        let now = Utc::now();
        for (path, content) in notes {
            vault.insert(Document::new(path, content, now));
        }
        vault
    }

    /// Insert or replace a document and refresh the snapshot.
    pub fn insert(&self, doc: Document) {
        {
            let mut docs = self.documents.write().unwrap_or_else(|e| e.into_inner());
            docs.retain(|d| d.path != doc.path);
            docs.push(doc);
        }
        self.refresh();
    }

    /// Make every subsequent write fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn refresh(&self) {
        let docs = self.documents.read().unwrap_or_else(|e| e.into_inner()).clone();
        *self.corpus.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(Corpus::new(docs));
    }

    fn check_writable(&self, path: &str) -> Result<(), VaultError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(VaultError::Io {
                path: path.to_string(),
                reason: "writes disabled".into(),
            });
        }
        Ok(())
    }

    fn contains(&self, path: &str) -> bool {
        self.documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|d| d.path == path)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryVault {
    fn snapshot(&self) -> Arc<Corpus> {
        self.corpus.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn reload(&self) -> Result<usize, VaultError> {
        self.refresh();
        Ok(self.snapshot().len())
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), VaultError> {
        if path.trim().is_empty() || path.starts_with('/') || path.split('/').any(|p| p == "..") {
            return Err(VaultError::InvalidPath(path.to_string()));
        }
        self.check_writable(path)?;
        let modified: DateTime<Utc> = Utc::now();
        self.insert(Document::new(path, content, modified));
        Ok(())
    }

    async fn create_unique(&self, category: Category, slug: &str, content: &str) -> Result<String, VaultError> {
        let dir = category.dir_name();
        let mut path = format!("{dir}/{slug}.md");
        if self.contains(&path) {
            let stamp = Local::now().format("%H%M%S");
            path = format!("{dir}/{slug}-{stamp}.md");
            let mut n = 2;
            while self.contains(&path) {
                path = format!("{dir}/{slug}-{stamp}-{n}.md");
                n += 1;
            }
        }
        self.write(&path, content).await?;
        Ok(path)
    }
}

#[async_trait]
impl MemoryLedger for InMemoryVault {
    async fn read(&self, lane: Lane) -> Result<String, VaultError> {
        Ok(self.ledgers.lock().await.get(&lane).cloned().unwrap_or_default())
    }

    async fn append(&self, lane: Lane, section: LedgerSection, date: NaiveDate, note: &str) -> Result<(), VaultError> {
        self.check_writable("ledger")?;
        let mut ledgers = self.ledgers.lock().await;
        let current = ledgers.entry(lane).or_default();
        *current = append_to_section(current, section, &ledger_row(date, note));
        Ok(())
    }
}

/// History kept in a map; counts saves and can be told to fail them.
#[derive(Default)]
pub struct InMemoryHistory {
    lanes: Mutex<HashMap<Lane, Vec<Message>>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Pre-populate a lane, as if restored from disk.
    pub async fn seed(&self, lane: Lane, messages: Vec<Message>) {
        self.lanes.lock().await.insert(lane, messages);
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn load(&self, lane: Lane) -> Vec<Message> {
        self.lanes.lock().await.get(&lane).cloned().unwrap_or_default()
    }

    async fn save(&self, lane: Lane, messages: &[Message]) -> Result<(), VaultError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(VaultError::Io {
                path: format!("history/{lane}"),
                reason: "disk full".into(),
            });
        }
        let record = HistoryRecord::capped(messages);
        self.lanes.lock().await.insert(lane, record.messages);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_vault_snapshot() {
        let vault = InMemoryVault::with_notes([("Jobs/a.md", "# A"), ("Self/README.md", "# Me")]);
        assert_eq!(vault.snapshot().len(), 2);
        assert!(vault.snapshot().find_anchoring_doc().is_some());
        assert_eq!(vault.snapshot().list_by_category(Category::Jobs).len(), 1);
    }

    #[tokio::test]
    async fn failing_writes_surface_errors() {
        let vault = InMemoryVault::new();
        vault.fail_writes(true);
        assert!(vault.write("Jobs/a.md", "x").await.is_err());
        assert!(vault.snapshot().is_empty());
    }

    #[tokio::test]
    async fn history_counts_saves() {
        let history = InMemoryHistory::new();
        history.save(Lane::Jobs, &[Message::user("a")]).await.unwrap();
        history.fail_saves(true);
        assert!(history.save(Lane::Jobs, &[]).await.is_err());
        assert_eq!(history.save_count(), 1);
        assert_eq!(history.load(Lane::Jobs).await.len(), 1);
    }
}
