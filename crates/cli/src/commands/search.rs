//! `dispatch search`: case-insensitive text search over the vault.
//!
//! Reads the vault directly, so it works before an API key is set.

use std::io::Write;

use dispatch_agent::SearchHit;
use dispatch_config::AppConfig;
use dispatch_core::KnowledgeStore;
use dispatch_vault::FileVault;

pub async fn run(config: AppConfig, query: String) -> Result<(), Box<dyn std::error::Error>> {
    let query = query.trim();
    if query.is_empty() {
        return Err("Search query cannot be empty".into());
    }
    let vault = FileVault::open(&config.vault_path).await?;
    let corpus = vault.snapshot();
    let hits: Vec<SearchHit> = corpus
        .search(query)
        .into_iter()
        .map(|doc| SearchHit::from_match(doc, query))
        .collect();
    render_hits(query, &hits, std::io::stdout().lock())?;
    Ok(())
}

fn render_hits(query: &str, hits: &[SearchHit], mut out: impl Write) -> std::io::Result<()> {
    if hits.is_empty() {
        return writeln!(out, "No notes mention \"{query}\".");
    }
    writeln!(out, "{} note(s) mention \"{query}\":\n", hits.len())?;
    for hit in hits {
        writeln!(out, "  {}  ({})", hit.title, hit.path)?;
        writeln!(out, "    {}", hit.snippet)?;
    }
    Ok(())
}
