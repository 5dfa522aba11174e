//! Vault scaffolding for `dispatch init`.

use std::path::{Path, PathBuf};

use dispatch_core::error::VaultError;
use dispatch_core::memory::LedgerSection;
use dispatch_core::{Category, Lane};
use tracing::info;

use crate::atomic::write_atomic;

/// What `init_vault` created. Existing files are never touched.
#[derive(Debug, Default)]
pub struct InitReport {
    pub created_dirs: Vec<PathBuf>,
    pub created_files: Vec<PathBuf>,
}

/// Create the folder layout, an anchoring profile note and one empty
/// memory ledger per lane. Safe to run repeatedly.
pub async fn init_vault(root: &Path, owner: Option<&str>) -> Result<InitReport, VaultError> {
    let mut report = InitReport::default();

    let mut dirs: Vec<PathBuf> = Category::FOLDERS
        .iter()
        .map(|c| root.join(c.dir_name()))
        .collect();
    dirs.push(root.join("Templates"));
    dirs.extend(Lane::ALL.iter().map(|l| root.join(crate::AGENTS_DIR).join(l.id())));

    for dir in dirs {
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| VaultError::io(&dir, e))?;
            report.created_dirs.push(dir);
        }
    }

    let owner = owner.unwrap_or("me");
    let readme = format!(
        "# About {owner}\n\nWho I am, what I'm working toward, and how I like to be helped.\n\n## Goals\n\n## Preferences\n"
    );
    write_if_absent(&root.join("Self/README.md"), &readme, &mut report).await?;

    for lane in Lane::ALL {
        let ledger = format!(
            "# {} memory\n\n{}\n{}\n\n{}\n{}\n",
            lane.id(),
            LedgerSection::MemoryLog.heading(),
            LedgerSection::MemoryLog.table_header(),
            LedgerSection::ConversationLog.heading(),
            LedgerSection::ConversationLog.table_header(),
        );
        let path = root.join(crate::AGENTS_DIR).join(lane.id()).join("memory.md");
        write_if_absent(&path, &ledger, &mut report).await?;
    }

    info!(
        root = %root.display(),
        dirs = report.created_dirs.len(),
        files = report.created_files.len(),
        "Vault initialised"
    );
    Ok(report)
}

async fn write_if_absent(path: &Path, content: &str, report: &mut InitReport) -> Result<(), VaultError> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(());
    }
    write_atomic(path, content)
        .await
        .map_err(|e| VaultError::io(path, e))?;
    report.created_files.push(path.to_path_buf());
    Ok(())
}
