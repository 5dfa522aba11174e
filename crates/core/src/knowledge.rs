//! Knowledge store: the document corpus that grounds every model call.
//!
//! The corpus is loaded wholesale into an immutable [`Corpus`] snapshot.
//! Readers hold an `Arc<Corpus>` and never observe a half-written document:
//! writers replace whole files and then swap in a freshly loaded snapshot.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Top-level vault categories. The set is closed; anything else is uncategorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Jobs,
    Build,
    Learn,
    Home,
    Write,
    #[serde(rename = "Self")]
    SelfCare,
    Daily,
    Uncategorized,
}

impl Category {
    /// Categories backed by a vault folder, in display order.
    pub const FOLDERS: [Category; 7] = [
        Category::Jobs,
        Category::Build,
        Category::Learn,
        Category::Home,
        Category::Write,
        Category::SelfCare,
        Category::Daily,
    ];

    /// Folder name in the vault.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Jobs => "Jobs",
            Category::Build => "Build",
            Category::Learn => "Learn",
            Category::Home => "Home",
            Category::Write => "Write",
            Category::SelfCare => "Self",
            Category::Daily => "Daily",
            Category::Uncategorized => "Root",
        }
    }

    /// Category for a top-level folder name. Exact match only.
    pub fn from_dir(name: &str) -> Category {
        Category::FOLDERS
            .into_iter()
            .find(|c| c.dir_name() == name)
            .unwrap_or(Category::Uncategorized)
    }

    /// Lenient parse for user- or model-supplied names ("jobs", "Self").
    pub fn parse(name: &str) -> Option<Category> {
        let name = name.trim();
        Category::FOLDERS
            .into_iter()
            .find(|c| c.dir_name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A note as listed to the model: no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRef {
    pub title: String,
    pub path: String,
}

/// One Markdown document, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Corpus-relative path with `/` separators. The document's identity.
    pub path: String,
    pub category: Category,
    pub title: String,
    pub content: String,
    pub modified: DateTime<Utc>,
}

impl Document {
    /// Build a document, deriving category and title from path and text.
    pub fn new(path: impl Into<String>, content: impl Into<String>, modified: DateTime<Utc>) -> Self {
        let path = path.into();
        let content = content.into();
        let category = match path.split_once('/') {
            Some((top, _)) => Category::from_dir(top),
            None => Category::Uncategorized,
        };
        let title = content
            .lines()
            .find_map(|line| line.strip_prefix("# "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| file_stem(&path).to_string());
        Self {
            path,
            category,
            title,
            content,
            modified,
        }
    }

    /// File name without directories.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// File name without the `.md` extension.
    pub fn stem(&self) -> &str {
        file_stem(&self.path)
    }

    /// Leading excerpt of at most `max_chars` characters, trimmed.
    pub fn excerpt(&self, max_chars: usize) -> &str {
        truncate_chars(&self.content, max_chars).trim()
    }

    pub fn to_ref(&self) -> NoteRef {
        NoteRef {
            title: self.title.clone(),
            path: self.path.clone(),
        }
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Longest prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// An immutable snapshot of every document in the vault, ordered by path.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    pub fn new(mut documents: Vec<Document>) -> Self {
        documents.sort_by(|a, b| a.path.cmp(&b.path));
        Self { documents }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.path == path)
    }

    /// Documents in one category, in path order.
    pub fn list_by_category(&self, category: Category) -> Vec<&Document> {
        self.documents
            .iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// The "about the person" note: the first Self document named README.
    pub fn find_anchoring_doc(&self) -> Option<&Document> {
        self.documents
            .iter()
            .find(|d| d.category == Category::SelfCare && d.file_name().contains("README"))
    }

    /// Today's dated note. An exact `YYYY-MM-DD` stem wins over a name
    /// that merely contains the date (such as a standup record).
    pub fn today_doc(&self, today: NaiveDate) -> Option<&Document> {
        let date = today.format("%Y-%m-%d").to_string();
        let daily = self.list_by_category(Category::Daily);
        daily
            .iter()
            .find(|d| d.stem() == date)
            .or_else(|| daily.iter().find(|d| d.file_name().contains(&date)))
            .copied()
    }

    /// Documents in `category` modified within the last `within_days`, newest first.
    pub fn most_recent(&self, category: Category, within_days: u32, now: DateTime<Utc>) -> Vec<&Document> {
        let cutoff = now - Duration::days(i64::from(within_days));
        let mut recent: Vec<&Document> = self
            .documents
            .iter()
            .filter(|d| d.category == category && d.modified >= cutoff)
            .collect();
        recent.sort_by(|a, b| b.modified.cmp(&a.modified));
        recent
    }

    /// Case-insensitive full-text search over document contents, in path
    /// order. A blank query matches nothing.
    pub fn search(&self, query: &str) -> Vec<&Document> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.documents
            .iter()
            .filter(|d| d.content.to_lowercase().contains(&needle))
            .collect()
    }

    /// Document count per folder category, uncategorized last.
    pub fn counts(&self) -> Vec<(Category, usize)> {
        Category::FOLDERS
            .into_iter()
            .chain(std::iter::once(Category::Uncategorized))
            .map(|c| (c, self.documents.iter().filter(|d| d.category == c).count()))
            .collect()
    }
}

/// Access to the vault. Reads go through the current snapshot; writes are
/// atomic whole-file replacements followed by a reload.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// The current in-memory snapshot.
    fn snapshot(&self) -> Arc<Corpus>;

    /// Reload the corpus wholesale from storage. Returns the document count.
    async fn reload(&self) -> Result<usize, VaultError>;

    /// Write (create or replace) a document at a corpus-relative path.
    async fn write(&self, path: &str, content: &str) -> Result<(), VaultError>;

    /// Create `<category>/<slug>.md`, disambiguating instead of overwriting.
    /// Returns the corpus-relative path created.
    async fn create_unique(&self, category: Category, slug: &str, content: &str) -> Result<String, VaultError>;
}
