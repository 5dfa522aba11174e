//! Memory ledger: each lane's private, append-only free-text log.
//!
//! A ledger is read only by its own lane. Entries are dated rows appended
//! under a named section; the section is created on first use.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::lane::Lane;

/// Which ledger section an entry is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSection {
    /// Facts the model chose to keep (the `update_memory` tool).
    MemoryLog,
    /// Insights the user explicitly asked the lane to remember.
    ConversationLog,
}

impl LedgerSection {
    pub fn heading(&self) -> &'static str {
        match self {
            LedgerSection::MemoryLog => "## Memory Log",
            LedgerSection::ConversationLog => "## Conversation Log",
        }
    }

    /// Markdown table header written under a fresh heading.
    pub fn table_header(&self) -> &'static str {
        match self {
            LedgerSection::MemoryLog => "| Date | Note |\n|------|------|",
            LedgerSection::ConversationLog => "| Date | Key Insight |\n|------|-------------|",
        }
    }
}

/// Render one dated ledger row. Pipes and line breaks would break the table.
pub fn ledger_row(date: NaiveDate, note: &str) -> String {
    let flat = note
        .trim()
        .replace('|', "\\|")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    format!("| {} | {} |", date.format("%Y-%m-%d"), flat)
}

/// Append `row` under `section` in `ledger`, creating the section if absent.
pub fn append_to_section(ledger: &str, section: LedgerSection, row: &str) -> String {
    let heading = section.heading();
    let Some(start) = ledger.find(heading) else {
        let mut out = ledger.trim_end().to_string();
        out.push_str(&format!("\n\n{heading}\n{}\n{row}\n", section.table_header()));
        return out;
    };

    // The section runs until the next level-2 heading or the end of file.
    let body_start = start + heading.len();
    let end = ledger[body_start..]
        .find("\n## ")
        .map(|i| body_start + i)
        .unwrap_or(ledger.len());
    let mut out = ledger[..end].trim_end().to_string();
    out.push('\n');
    out.push_str(row);
    out.push('\n');
    let rest = &ledger[end..];
    if !rest.is_empty() {
        out.push_str(rest);
    }
    out
}

/// Per-lane private memory.
#[async_trait]
pub trait MemoryLedger: Send + Sync {
    /// The lane's ledger text. Empty if it has never been written.
    async fn read(&self, lane: Lane) -> Result<String, VaultError>;

    /// Append a dated row under `section`.
    async fn append(&self, lane: Lane, section: LedgerSection, date: NaiveDate, note: &str) -> Result<(), VaultError>;
}
