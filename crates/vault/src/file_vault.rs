//! File-backed vault: the Markdown knowledge store and memory ledgers.
//!
//! Layout:
//! - `<Category>/<note>.md` documents, loaded wholesale into a [`Corpus`]
//! - `Agents/<lane>/memory.md` private ledgers (never part of the corpus)
//!
//! Writes replace whole files atomically and then reload the snapshot, so a
//! reader holding the previous `Arc<Corpus>` keeps a consistent view.

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use dispatch_core::error::VaultError;
use dispatch_core::knowledge::{Category, Corpus, KnowledgeStore};
use dispatch_core::memory::{append_to_section, ledger_row, LedgerSection, MemoryLedger};
use dispatch_core::Lane;
use tracing::{debug, info};

use crate::atomic::write_atomic;
use crate::scan::load_corpus;

pub struct FileVault {
    root: PathBuf,
    corpus: RwLock<Arc<Corpus>>,
}

impl FileVault {
    /// Open a vault and load its corpus.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let vault = Self {
            root: root.into(),
            corpus: RwLock::new(Arc::new(Corpus::default())),
        };
        let count = vault.reload().await?;
        info!(root = %vault.root.display(), notes = count, "Vault opened");
        Ok(vault)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a corpus-relative path, refusing anything that escapes the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, VaultError> {
        let rel = Path::new(relative);
        let escapes = relative.trim().is_empty()
            || rel.components().any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(VaultError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn ledger_path(&self, lane: Lane) -> PathBuf {
        self.root
            .join(crate::AGENTS_DIR)
            .join(lane.id())
            .join("memory.md")
    }

    fn swap(&self, corpus: Corpus) {
        let mut guard = self.corpus.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(corpus);
    }
}

#[async_trait]
impl KnowledgeStore for FileVault {
    fn snapshot(&self) -> Arc<Corpus> {
        self.corpus.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn reload(&self) -> Result<usize, VaultError> {
        let root = self.root.clone();
        let corpus = tokio::task::spawn_blocking(move || load_corpus(&root))
            .await
            .map_err(|e| VaultError::Io {
                path: self.root.display().to_string(),
                reason: e.to_string(),
            })??;
        let count = corpus.len();
        self.swap(corpus);
        Ok(count)
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), VaultError> {
        let full = self.resolve(path)?;
        write_atomic(&full, content)
            .await
            .map_err(|e| VaultError::io(&full, e))?;
        debug!(path, bytes = content.len(), "Note written");
        self.reload().await?;
        Ok(())
    }

    async fn create_unique(&self, category: Category, slug: &str, content: &str) -> Result<String, VaultError> {
        if category == Category::Uncategorized {
            return Err(VaultError::InvalidPath(format!("no folder for {category}")));
        }
        let dir = category.dir_name();
        let exists = |rel: &str| {
            let full = self.root.join(rel);
            async move { tokio::fs::try_exists(&full).await.unwrap_or(false) }
        };

        let mut relative = format!("{dir}/{slug}.md");
        if exists(&relative).await {
            let stamp = Local::now().format("%H%M%S");
            relative = format!("{dir}/{slug}-{stamp}.md");
            let mut n = 2;
            while exists(&relative).await {
                relative = format!("{dir}/{slug}-{stamp}-{n}.md");
                n += 1;
            }
        }

        self.write(&relative, content).await?;
        Ok(relative)
    }
}

#[async_trait]
impl MemoryLedger for FileVault {
    async fn read(&self, lane: Lane) -> Result<String, VaultError> {
        let path = self.ledger_path(lane);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(VaultError::io(&path, e)),
        }
    }

    async fn append(&self, lane: Lane, section: LedgerSection, date: NaiveDate, note: &str) -> Result<(), VaultError> {
        let path = self.ledger_path(lane);
        let mut current = self.read(lane).await?;
        if current.trim().is_empty() {
            current = format!("# {} memory\n", lane.id());
        }
        let updated = append_to_section(&current, section, &ledger_row(date, note));
        write_atomic(&path, updated)
            .await
            .map_err(|e| VaultError::io(&path, e))?;
        debug!(lane = %lane, ?section, "Ledger entry appended");
        Ok(())
    }
}
