//! Corpus loading: walk the vault and read every Markdown note.

use std::path::Path;

use chrono::{DateTime, Utc};
use dispatch_core::error::VaultError;
use dispatch_core::knowledge::{Corpus, Document};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories never loaded into the corpus.
pub const IGNORE_DIRS: [&str; 6] = [".obsidian", ".git", "Assets", "Templates", "__pycache__", crate::AGENTS_DIR];

fn is_ignored(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORE_DIRS.contains(&name))
}

/// Load every `.md` file under `root`. Unreadable files are skipped with a warning.
///
/// Blocking; call from `spawn_blocking` inside async code.
pub fn load_corpus(root: &Path) -> Result<Corpus, VaultError> {
    if !root.is_dir() {
        return Err(VaultError::NotFound(root.display().to_string()));
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_ignored(e))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }

        let Some(relative) = relative_key(root, path) else {
            continue;
        };

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %relative, error = %e, "Skipping unreadable note");
                continue;
            }
        };
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(Utc::now);

        documents.push(Document::new(relative, content, modified));
    }

    debug!(root = %root.display(), count = documents.len(), "Vault corpus loaded");
    Ok(Corpus::new(documents))
}

/// Corpus-relative key with `/` separators.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
